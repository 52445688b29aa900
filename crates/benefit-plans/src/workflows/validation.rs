use super::payment_plan::ApprovalStage;
use super::targeting::{ComparisonMethod, EntityKind, ValueType};

/// Construction-time errors. Values that pass validation never fail during evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("field name must not be blank")]
    BlankFieldName,
    #[error("field '{field}' is a selection field and needs at least one choice")]
    MissingChoices { field: String },
    #[error("field '{field}' declares choice '{choice}' more than once")]
    DuplicateChoice { field: String, choice: String },
    #[error("field '{field}' is not a selection field and cannot declare choices")]
    UnexpectedChoices { field: String },
    #[error("periodic field '{field}' must declare at least one round")]
    NoRounds { field: String },
    #[error("periodic field '{field}' cannot hold {value_type:?} values")]
    UnsupportedPeriodicType { field: String, value_type: ValueType },
    #[error("{method:?} is not supported for {value_type:?} field '{field}'")]
    UnsupportedMethod {
        field: String,
        method: ComparisonMethod,
        value_type: ValueType,
    },
    #[error("{method:?} on '{field}' expects {expected} argument(s), found {found}")]
    Arity {
        field: String,
        method: ComparisonMethod,
        expected: &'static str,
        found: usize,
    },
    #[error("argument '{value}' for '{field}' is not a number")]
    NotNumeric { field: String, value: String },
    #[error("argument '{value}' for '{field}' is not a boolean")]
    NotBoolean { field: String, value: String },
    #[error("argument '{value}' for '{field}' is not a YYYY-MM-DD date")]
    NotDate { field: String, value: String },
    #[error("argument '{value}' is not an allowed choice for '{field}'")]
    UnknownChoice { field: String, value: String },
    #[error("argument for '{field}' must not be blank")]
    BlankArgument { field: String },
    #[error("range on '{field}' has its lower bound above its upper bound")]
    InvertedRange { field: String },
    #[error("periodic field '{field}' needs a round number")]
    MissingRound { field: String },
    #[error("round {round} is outside 1..={rounds} for '{field}'")]
    RoundOutOfRange { field: String, round: u32, rounds: u32 },
    #[error("field '{field}' is not periodic and cannot take a round number")]
    UnexpectedRound { field: String },
    #[error("{found:?} field '{field}' cannot be placed in a {expected:?} filter block")]
    MixedEntityKinds {
        field: String,
        expected: EntityKind,
        found: EntityKind,
    },
    #[error("criterion has no filter blocks and no identifiers")]
    EmptyCriterion,
    #[error("criterion index {index} is out of bounds for {len} criteria")]
    CriterionIndex { index: usize, len: usize },
    #[error("identifier '{value}' must start with {expected}")]
    InvalidIdentifier { value: String, expected: &'static str },
    #[error("exclusion reason exceeds {max} characters (found {found})")]
    ExclusionReasonTooLong { max: usize, found: usize },
    #[error("{stage:?} stage requires at least one approval (found {value})")]
    InvalidQuorum { stage: ApprovalStage, value: u32 },
}

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::coerce::{parse_bool, parse_date, parse_number};
use super::domain::{FieldRef, ValueType};
use crate::workflows::ValidationError;

/// Comparison applied by a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonMethod {
    Equals,
    NotEquals,
    Range,
    LessThan,
    GreaterThan,
    Contains,
    IsNull,
}

enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(expected) => count == *expected,
            Arity::AtLeast(minimum) => count >= *minimum,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Arity::Exactly(0) => "no",
            Arity::Exactly(1) => "exactly 1",
            Arity::Exactly(_) => "exactly 2",
            Arity::AtLeast(_) => "at least 1",
        }
    }
}

impl ComparisonMethod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::Range => "RANGE",
            Self::LessThan => "LESS_THAN",
            Self::GreaterThan => "GREATER_THAN",
            Self::Contains => "CONTAINS",
            Self::IsNull => "IS_NULL",
        }
    }

    /// Whether the method can be applied to a field holding `value_type`.
    pub const fn supports(self, value_type: ValueType) -> bool {
        match self {
            Self::IsNull => true,
            Self::Equals | Self::NotEquals => !matches!(value_type, ValueType::Image),
            Self::Range | Self::LessThan | Self::GreaterThan => value_type.is_ordered(),
            Self::Contains => matches!(value_type, ValueType::String | ValueType::SelectMany),
        }
    }

    fn arity(self, value_type: ValueType) -> Arity {
        match self {
            Self::IsNull => Arity::Exactly(0),
            Self::Equals | Self::NotEquals | Self::LessThan | Self::GreaterThan => {
                Arity::Exactly(1)
            }
            Self::Range => Arity::Exactly(2),
            Self::Contains if value_type == ValueType::String => Arity::Exactly(1),
            Self::Contains => Arity::AtLeast(1),
        }
    }
}

/// Typed rule argument, coerced from the authored text when the rule is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Operand {
    pub(crate) fn compare_with(&self, other: &Operand) -> Option<Ordering> {
        match (self, other) {
            (Operand::Number(left), Operand::Number(right)) => left.partial_cmp(right),
            (Operand::Date(left), Operand::Date(right)) => Some(left.cmp(right)),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Text(text) => f.write_str(text),
            Operand::Number(value) => write!(f, "{value}"),
            Operand::Bool(value) => write!(f, "{value}"),
            Operand::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// Atomic predicate over one field. Arguments always type-check against the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleDraft", into = "RuleDraft")]
pub struct Rule {
    field: FieldRef,
    method: ComparisonMethod,
    arguments: Vec<Operand>,
    round_number: Option<u32>,
}

/// Rule as authored: raw text arguments that have not been checked yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub field: FieldRef,
    pub method: ComparisonMethod,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u32>,
}

impl Rule {
    pub fn new<I, S>(
        field: FieldRef,
        method: ComparisonMethod,
        arguments: I,
        round_number: Option<u32>,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_round(&field, round_number)?;

        let value_type = field.value_type();
        if !method.supports(value_type) {
            return Err(ValidationError::UnsupportedMethod {
                field: field.name().to_string(),
                method,
                value_type,
            });
        }

        let raw: Vec<String> = arguments.into_iter().map(Into::into).collect();
        let arity = method.arity(value_type);
        if !arity.accepts(raw.len()) {
            return Err(ValidationError::Arity {
                field: field.name().to_string(),
                method,
                expected: arity.label(),
                found: raw.len(),
            });
        }

        let arguments = raw
            .iter()
            .map(|value| coerce_argument(&field, method, value))
            .collect::<Result<Vec<_>, _>>()?;

        if method == ComparisonMethod::Range
            && arguments[0].compare_with(&arguments[1]) == Some(Ordering::Greater)
        {
            return Err(ValidationError::InvertedRange {
                field: field.name().to_string(),
            });
        }

        Ok(Self {
            field,
            method,
            arguments,
            round_number,
        })
    }

    /// Shorthand for an `IS_NULL` rule, which takes no arguments.
    pub fn is_null(field: FieldRef, round_number: Option<u32>) -> Result<Self, ValidationError> {
        Self::new(
            field,
            ComparisonMethod::IsNull,
            Vec::<String>::new(),
            round_number,
        )
    }

    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    pub fn method(&self) -> ComparisonMethod {
        self.method
    }

    pub fn arguments(&self) -> &[Operand] {
        &self.arguments
    }

    pub fn round_number(&self) -> Option<u32> {
        self.round_number
    }

    pub fn describe(&self) -> String {
        let mut text = self.field.name().to_string();
        if let Some(round) = self.round_number {
            text.push_str(&format!("[round {round}]"));
        }
        text.push(' ');
        text.push_str(self.method.label());
        match self.arguments.as_slice() {
            [] => {}
            [single] => text.push_str(&format!(" {single}")),
            many => {
                let rendered: Vec<String> = many.iter().map(ToString::to_string).collect();
                text.push_str(&format!(" [{}]", rendered.join(", ")));
            }
        }
        text
    }
}

fn check_round(field: &FieldRef, round_number: Option<u32>) -> Result<(), ValidationError> {
    let name = || field.name().to_string();
    match (field.field_type().rounds(), round_number) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(ValidationError::UnexpectedRound { field: name() }),
        (Some(_), None) => Err(ValidationError::MissingRound { field: name() }),
        (Some(rounds), Some(round)) if round >= 1 && round <= rounds => Ok(()),
        (Some(rounds), Some(round)) => Err(ValidationError::RoundOutOfRange {
            field: name(),
            round,
            rounds,
        }),
    }
}

fn coerce_argument(
    field: &FieldRef,
    method: ComparisonMethod,
    raw: &str,
) -> Result<Operand, ValidationError> {
    let name = || field.name().to_string();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankArgument { field: name() });
    }

    match field.value_type() {
        ValueType::String => Ok(Operand::Text(trimmed.to_string())),
        ValueType::Number => parse_number(trimmed)
            .map(Operand::Number)
            .ok_or_else(|| ValidationError::NotNumeric {
                field: name(),
                value: raw.to_string(),
            }),
        ValueType::Bool => parse_bool(trimmed)
            .map(Operand::Bool)
            .ok_or_else(|| ValidationError::NotBoolean {
                field: name(),
                value: raw.to_string(),
            }),
        ValueType::Date => parse_date(trimmed)
            .map(Operand::Date)
            .ok_or_else(|| ValidationError::NotDate {
                field: name(),
                value: raw.to_string(),
            }),
        ValueType::SelectOne | ValueType::SelectMany => {
            if field.allows_choice(trimmed) {
                Ok(Operand::Text(trimmed.to_string()))
            } else {
                Err(ValidationError::UnknownChoice {
                    field: name(),
                    value: raw.to_string(),
                })
            }
        }
        ValueType::Image => Err(ValidationError::UnsupportedMethod {
            field: name(),
            method,
            value_type: ValueType::Image,
        }),
    }
}

impl TryFrom<RuleDraft> for Rule {
    type Error = ValidationError;

    fn try_from(draft: RuleDraft) -> Result<Self, Self::Error> {
        Self::new(draft.field, draft.method, draft.arguments, draft.round_number)
    }
}

impl From<Rule> for RuleDraft {
    fn from(rule: Rule) -> Self {
        Self {
            arguments: rule.arguments.iter().map(ToString::to_string).collect(),
            field: rule.field,
            method: rule.method,
            round_number: rule.round_number,
        }
    }
}

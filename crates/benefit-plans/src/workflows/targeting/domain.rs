use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::ValidationError;

/// Entity a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Household,
    Individual,
    Collector,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Household => "household",
            Self::Individual => "individual",
            Self::Collector => "collector",
        }
    }
}

/// Value type stored in a field (or in each round of a periodic field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    String,
    Number,
    Bool,
    SelectOne,
    SelectMany,
    Date,
    Image,
}

impl ValueType {
    pub const fn is_select(self) -> bool {
        matches!(self, Self::SelectOne | Self::SelectMany)
    }

    pub const fn is_ordered(self) -> bool {
        matches!(self, Self::Number | Self::Date)
    }
}

/// Declared shape of a field. Periodic fields hold one value per collection round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Plain { value_type: ValueType },
    Periodic { value_type: ValueType, rounds: u32 },
}

impl FieldType {
    pub const fn plain(value_type: ValueType) -> Self {
        Self::Plain { value_type }
    }

    pub const fn periodic(value_type: ValueType, rounds: u32) -> Self {
        Self::Periodic { value_type, rounds }
    }

    pub const fn value_type(self) -> ValueType {
        match self {
            Self::Plain { value_type } | Self::Periodic { value_type, .. } => value_type,
        }
    }

    pub const fn rounds(self) -> Option<u32> {
        match self {
            Self::Plain { .. } => None,
            Self::Periodic { rounds, .. } => Some(rounds),
        }
    }
}

/// Reference to a field on an entity kind. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FieldRefDraft", into = "FieldRefDraft")]
pub struct FieldRef {
    entity: EntityKind,
    name: String,
    field_type: FieldType,
    choices: Vec<String>,
}

/// Unvalidated field description, as supplied by an authoring surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRefDraft {
    pub entity: EntityKind,
    pub name: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl FieldRef {
    pub fn new(
        entity: EntityKind,
        name: impl Into<String>,
        field_type: FieldType,
    ) -> Result<Self, ValidationError> {
        Self::with_choices(entity, name, field_type, Vec::<String>::new())
    }

    pub fn with_choices<I, S>(
        entity: EntityKind,
        name: impl Into<String>,
        field_type: FieldType,
        choices: I,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::BlankFieldName);
        }

        let value_type = field_type.value_type();
        if let FieldType::Periodic { rounds, .. } = field_type {
            if rounds == 0 {
                return Err(ValidationError::NoRounds { field: name });
            }
            if value_type == ValueType::Image {
                return Err(ValidationError::UnsupportedPeriodicType {
                    field: name,
                    value_type,
                });
            }
        }

        let choices: Vec<String> = choices.into_iter().map(Into::into).collect();
        if value_type.is_select() {
            if choices.is_empty() {
                return Err(ValidationError::MissingChoices { field: name });
            }
            for (index, choice) in choices.iter().enumerate() {
                if choices[..index].contains(choice) {
                    return Err(ValidationError::DuplicateChoice {
                        field: name,
                        choice: choice.clone(),
                    });
                }
            }
        } else if !choices.is_empty() {
            return Err(ValidationError::UnexpectedChoices { field: name });
        }

        Ok(Self {
            entity,
            name,
            field_type,
            choices,
        })
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn value_type(&self) -> ValueType {
        self.field_type.value_type()
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn allows_choice(&self, value: &str) -> bool {
        self.choices.iter().any(|choice| choice == value)
    }
}

impl TryFrom<FieldRefDraft> for FieldRef {
    type Error = ValidationError;

    fn try_from(draft: FieldRefDraft) -> Result<Self, Self::Error> {
        Self::with_choices(draft.entity, draft.name, draft.field_type, draft.choices)
    }
}

impl From<FieldRef> for FieldRefDraft {
    fn from(field: FieldRef) -> Self {
        Self {
            entity: field.entity,
            name: field.name,
            field_type: field.field_type,
            choices: field.choices,
        }
    }
}

/// Value held by a record for a field, as supplied by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Choices(Vec<String>),
    Image(String),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) | FieldValue::Image(text) => text.trim().is_empty(),
            FieldValue::Choices(values) => values.is_empty(),
            FieldValue::Number(value) => value.is_nan(),
            FieldValue::Bool(_) | FieldValue::Date(_) => false,
        }
    }
}

/// Field values of one entity, keyed by field name. Periodic values are keyed by round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub periodic: BTreeMap<String, BTreeMap<u32, FieldValue>>,
}

impl EntitySnapshot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_round(mut self, name: impl Into<String>, round: u32, value: FieldValue) -> Self {
        self.periodic
            .entry(name.into())
            .or_default()
            .insert(round, value);
        self
    }

    pub(crate) fn set(&mut self, name: &str, round: Option<u32>, value: FieldValue) {
        match round {
            Some(round) => {
                self.periodic
                    .entry(name.to_string())
                    .or_default()
                    .insert(round, value);
            }
            None => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }

    pub fn value(&self, field: &FieldRef, round: Option<u32>) -> Option<&FieldValue> {
        match round {
            Some(round) => self
                .periodic
                .get(field.name())
                .and_then(|rounds| rounds.get(&round)),
            None => self.fields.get(field.name()),
        }
    }
}

/// Everything needed to evaluate a household against a criteria set, loaded up front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HouseholdSnapshot {
    pub household: EntitySnapshot,
    #[serde(default)]
    pub individuals: Vec<EntitySnapshot>,
    #[serde(default)]
    pub collectors: Vec<EntitySnapshot>,
}

impl HouseholdSnapshot {
    pub fn new(household: EntitySnapshot) -> Self {
        Self {
            household,
            individuals: Vec::new(),
            collectors: Vec::new(),
        }
    }

    pub fn with_individual(mut self, individual: EntitySnapshot) -> Self {
        self.individuals.push(individual);
        self
    }

    pub fn with_collector(mut self, collector: EntitySnapshot) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn id(&self) -> &str {
        &self.household.id
    }

    /// Household identifier followed by every member identifier.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.household.id.as_str())
            .chain(self.individuals.iter().map(|member| member.id.as_str()))
            .chain(self.collectors.iter().map(|member| member.id.as_str()))
    }
}

use std::cmp::Ordering;

use chrono::NaiveDate;

use super::super::coerce::{parse_bool, parse_date, parse_number};
use super::super::domain::{FieldValue, ValueType};
use super::super::rule::{ComparisonMethod, Operand, Rule};

/// Runtime comparison. Anything that cannot be compared is a non-match, never a panic.
pub(crate) fn compare(rule: &Rule, actual: Option<&FieldValue>) -> bool {
    let Some(actual) = actual.filter(|value| !value.is_empty()) else {
        return rule.method() == ComparisonMethod::IsNull;
    };

    let value_type = rule.field().value_type();
    let arguments = rule.arguments();

    match rule.method() {
        ComparisonMethod::Equals => equals(value_type, actual, &arguments[0]).unwrap_or(false),
        ComparisonMethod::NotEquals => equals(value_type, actual, &arguments[0])
            .map(|equal| !equal)
            .unwrap_or(false),
        ComparisonMethod::Range => {
            let Some(value) = ordered(value_type, actual) else {
                return false;
            };
            matches!(
                value.compare_with(&arguments[0]),
                Some(Ordering::Greater | Ordering::Equal)
            ) && matches!(
                value.compare_with(&arguments[1]),
                Some(Ordering::Less | Ordering::Equal)
            )
        }
        ComparisonMethod::LessThan => ordered(value_type, actual)
            .and_then(|value| value.compare_with(&arguments[0]))
            .map(|ordering| ordering != Ordering::Greater)
            .unwrap_or(false),
        ComparisonMethod::GreaterThan => ordered(value_type, actual)
            .and_then(|value| value.compare_with(&arguments[0]))
            .map(|ordering| ordering != Ordering::Less)
            .unwrap_or(false),
        ComparisonMethod::Contains => contains(value_type, actual, arguments),
        ComparisonMethod::IsNull => false,
    }
}

fn equals(value_type: ValueType, actual: &FieldValue, argument: &Operand) -> Option<bool> {
    match (value_type, argument) {
        (ValueType::Number, Operand::Number(expected)) => {
            number(actual).map(|value| (value - expected).abs() < f64::EPSILON)
        }
        (ValueType::Date, Operand::Date(expected)) => date(actual).map(|value| value == *expected),
        (ValueType::Bool, Operand::Bool(expected)) => boolean(actual).map(|value| value == *expected),
        (ValueType::SelectOne | ValueType::SelectMany, Operand::Text(expected)) => {
            choices(actual).map(|values| values.iter().any(|value| *value == expected.as_str()))
        }
        (ValueType::String, Operand::Text(expected)) => match actual {
            FieldValue::Text(text) => Some(text.trim() == expected.as_str()),
            _ => None,
        },
        _ => None,
    }
}

fn contains(value_type: ValueType, actual: &FieldValue, arguments: &[Operand]) -> bool {
    match value_type {
        ValueType::String => match (actual, arguments) {
            (FieldValue::Text(text), [Operand::Text(needle)]) => text
                .to_lowercase()
                .contains(needle.to_lowercase().as_str()),
            _ => false,
        },
        ValueType::SelectMany => match choices(actual) {
            Some(values) => arguments.iter().all(|argument| match argument {
                Operand::Text(expected) => values.iter().any(|value| *value == expected.as_str()),
                _ => false,
            }),
            None => false,
        },
        _ => false,
    }
}

fn ordered(value_type: ValueType, actual: &FieldValue) -> Option<Operand> {
    match value_type {
        ValueType::Number => number(actual).map(Operand::Number),
        ValueType::Date => date(actual).map(Operand::Date),
        _ => None,
    }
}

fn number(actual: &FieldValue) -> Option<f64> {
    match actual {
        FieldValue::Number(value) => Some(*value),
        FieldValue::Text(text) => parse_number(text),
        _ => None,
    }
}

fn date(actual: &FieldValue) -> Option<NaiveDate> {
    match actual {
        FieldValue::Date(value) => Some(*value),
        FieldValue::Text(text) => parse_date(text),
        _ => None,
    }
}

fn boolean(actual: &FieldValue) -> Option<bool> {
    match actual {
        FieldValue::Bool(value) => Some(*value),
        FieldValue::Text(text) => parse_bool(text),
        _ => None,
    }
}

fn choices(actual: &FieldValue) -> Option<Vec<&str>> {
    match actual {
        FieldValue::Choices(values) => Some(values.iter().map(String::as_str).collect()),
        FieldValue::Text(text) => Some(vec![text.trim()]),
        _ => None,
    }
}

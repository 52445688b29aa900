use crate::workflows::ValidationError;

pub const HOUSEHOLD_ID_PREFIX: &str = "HH-";
pub const INDIVIDUAL_ID_PREFIX: &str = "IND-";

/// Which identifiers a list may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Household,
    Individual,
    Any,
}

impl IdKind {
    fn expected(self) -> &'static str {
        match self {
            IdKind::Household => HOUSEHOLD_ID_PREFIX,
            IdKind::Individual => INDIVIDUAL_ID_PREFIX,
            IdKind::Any => "HH- or IND-",
        }
    }

    fn accepts(self, id: &str) -> bool {
        let has_suffix = |prefix: &str| id.len() > prefix.len() && id.starts_with(prefix);
        match self {
            IdKind::Household => has_suffix(HOUSEHOLD_ID_PREFIX),
            IdKind::Individual => has_suffix(INDIVIDUAL_ID_PREFIX),
            IdKind::Any => has_suffix(HOUSEHOLD_ID_PREFIX) || has_suffix(INDIVIDUAL_ID_PREFIX),
        }
    }
}

/// Split free text ("HH-1, HH-2; HH-3") into normalized, de-duplicated identifiers.
pub fn parse_id_list(raw: &str, kind: IdKind) -> Result<Vec<String>, ValidationError> {
    normalize_ids(
        raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace()),
        kind,
    )
}

pub(crate) fn normalize_ids<I, S>(ids: I, kind: IdKind) -> Result<Vec<String>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for token in ids {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        let id = token.to_ascii_uppercase();
        if !kind.accepts(&id) {
            return Err(ValidationError::InvalidIdentifier {
                value: token.to_string(),
                expected: kind.expected(),
            });
        }
        if !normalized.contains(&id) {
            normalized.push(id);
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_mixed_separators_and_dedupes() {
        let ids = parse_id_list(" HH-1,hh-2;HH-1\nHH-3 ", IdKind::Household).expect("valid list");
        assert_eq!(ids, vec!["HH-1", "HH-2", "HH-3"]);
    }

    #[test]
    fn rejects_wrong_prefix() {
        match parse_id_list("HH-1, IND-2", IdKind::Household) {
            Err(ValidationError::InvalidIdentifier { value, expected }) => {
                assert_eq!(value, "IND-2");
                assert_eq!(expected, HOUSEHOLD_ID_PREFIX);
            }
            other => panic!("expected identifier error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bare_prefix() {
        assert!(parse_id_list("IND-", IdKind::Individual).is_err());
    }

    #[test]
    fn any_accepts_both_kinds() {
        let ids = parse_id_list("HH-9 IND-4", IdKind::Any).expect("valid list");
        assert_eq!(ids, vec!["HH-9", "IND-4"]);
    }

    #[test]
    fn blank_text_is_an_empty_list() {
        assert!(parse_id_list("  , ;", IdKind::Any)
            .expect("blank is fine")
            .is_empty());
    }
}

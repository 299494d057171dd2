// crates/fizzbuzz-server/src/query.rs
// ============================================================================
// Module: FizzBuzz Query Parsing
// Description: Strict parsing of fizzbuzz query strings.
// Purpose: Turn untrusted query input into a Configuration.
// Dependencies: fizzbuzz-core, url, thiserror
// ============================================================================

//! ## Overview
//! Query strings are decoded as `application/x-www-form-urlencoded`. Every
//! key must be one of `limit`, `int1`, `int2`, `str1`, `str2` and may appear
//! at most once; absent keys fall back to the default configuration. Divisor
//! signs are not checked here; [`fizzbuzz_core::SequenceEncoder::new`] does
//! that.

// ============================================================================
// SECTION: Imports
// ============================================================================

use fizzbuzz_core::ConfigField;
use fizzbuzz_core::Configuration;
use thiserror::Error;
use url::form_urlencoded;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Query string rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Key is not a configuration field.
    #[error("unknown query parameter \"{0}\"")]
    Unknown(String),
    /// Key appeared more than once.
    #[error("duplicate query parameter \"{0}\"")]
    Duplicate(ConfigField),
    /// Integer field did not parse.
    #[error("parsing {field} \"{value}\": {reason}")]
    Integer {
        /// Offending field.
        field: ConfigField,
        /// Raw decoded value.
        value: String,
        /// Parser failure.
        reason: String,
    },
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a raw query string into a configuration.
///
/// `None` and the empty string both yield [`Configuration::default`].
///
/// # Errors
///
/// Returns [`QueryError`] on unknown, duplicated or malformed parameters.
pub fn parse_fizzbuzz_query(raw: Option<&str>) -> Result<Configuration, QueryError> {
    let mut config = Configuration::default();
    let mut seen = [false; ConfigField::ALL.len()];
    for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        let field =
            ConfigField::from_wire_name(&key).ok_or_else(|| QueryError::Unknown(key.to_string()))?;
        let slot = field_slot(field);
        if seen[slot] {
            return Err(QueryError::Duplicate(field));
        }
        seen[slot] = true;
        match field {
            ConfigField::Limit => config.limit = parse_integer(field, &value)?,
            ConfigField::Divisor1 => config.divisor1 = parse_integer(field, &value)?,
            ConfigField::Divisor2 => config.divisor2 = parse_integer(field, &value)?,
            ConfigField::Replacement1 => config.replacement1 = value.into_owned(),
            ConfigField::Replacement2 => config.replacement2 = value.into_owned(),
        }
    }
    Ok(config)
}

/// Index of `field` in [`ConfigField::ALL`].
const fn field_slot(field: ConfigField) -> usize {
    match field {
        ConfigField::Limit => 0,
        ConfigField::Divisor1 => 1,
        ConfigField::Divisor2 => 2,
        ConfigField::Replacement1 => 3,
        ConfigField::Replacement2 => 4,
    }
}

/// Parses a signed decimal integer field.
fn parse_integer(field: ConfigField, value: &str) -> Result<i64, QueryError> {
    value.parse().map_err(|err: std::num::ParseIntError| QueryError::Integer {
        field,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use fizzbuzz_core::ConfigField;
    use fizzbuzz_core::Configuration;

    use super::QueryError;
    use super::parse_fizzbuzz_query;

    #[test]
    fn absent_and_empty_queries_use_defaults() {
        assert_eq!(parse_fizzbuzz_query(None).unwrap(), Configuration::default());
        assert_eq!(parse_fizzbuzz_query(Some("")).unwrap(), Configuration::default());
    }

    #[test]
    fn every_field_is_read() {
        let config =
            parse_fizzbuzz_query(Some("limit=13&int1=3&int2=4&str1=fi%26zz&str2=bu+zz")).unwrap();
        assert_eq!(config, Configuration::new(13, 3, 4, "fi&zz", "bu zz"));
    }

    #[test]
    fn empty_strings_are_kept() {
        let config = parse_fizzbuzz_query(Some("str1=&str2=")).unwrap();
        assert_eq!(config.replacement1, "");
        assert_eq!(config.replacement2, "");
        assert_eq!(config.limit, 10);
    }

    #[test]
    fn non_positive_divisors_parse() {
        let config = parse_fizzbuzz_query(Some("int1=0&int2=-1")).unwrap();
        assert_eq!(config.divisor1, 0);
        assert_eq!(config.divisor2, -1);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert_eq!(
            parse_fizzbuzz_query(Some("unknown")).unwrap_err(),
            QueryError::Unknown("unknown".to_string())
        );
        assert!(matches!(parse_fizzbuzz_query(Some(";")), Err(QueryError::Unknown(_))));
    }

    #[test]
    fn rejects_duplicates() {
        assert_eq!(
            parse_fizzbuzz_query(Some("limit=1&limit=1")).unwrap_err(),
            QueryError::Duplicate(ConfigField::Limit)
        );
    }

    #[test]
    fn rejects_malformed_integers() {
        for query in ["limit=a", "int1=a", "int2=", "limit=99999999999999999999", "limit=1.5"] {
            assert!(
                matches!(parse_fizzbuzz_query(Some(query)), Err(QueryError::Integer { .. })),
                "{query}"
            );
        }
        let message = parse_fizzbuzz_query(Some("limit=a")).unwrap_err().to_string();
        assert!(message.starts_with("parsing limit \"a\": "));
    }
}

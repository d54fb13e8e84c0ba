use crate::error::{Error, Result};

/// Parse caller-supplied text into a store key.
///
/// Keys are signed 64-bit integers. Anything else is rejected here so that
/// the router and storage engine never see unvalidated input.
pub fn parse_key(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("key cannot be empty".to_string()));
    }
    trimmed
        .parse::<i64>()
        .map_err(|e| Error::InvalidInput(format!("key must be an integer, got {:?}: {}", trimmed, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_keys() {
        assert_eq!(parse_key("42").unwrap(), 42);
        assert_eq!(parse_key("  -7 ").unwrap(), -7);
        assert_eq!(parse_key("+3").unwrap(), 3);
        assert_eq!(parse_key(&i64::MIN.to_string()).unwrap(), i64::MIN);
    }

    #[test]
    fn test_parse_invalid_keys() {
        for input in ["", "   ", "abc", "1.5", "12a", "99999999999999999999"] {
            assert!(
                matches!(parse_key(input), Err(Error::InvalidInput(_))),
                "{:?} should be rejected",
                input
            );
        }
    }
}

//! Shared-secret comparison

/// Compare a caller-supplied secret against the expected one
///
/// Every byte of `expected` is visited regardless of where the first
/// difference is, so timing does not reveal the matching prefix. An empty
/// `expected` never matches.
pub fn secret_matches(given: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let given = given.as_bytes();
    let expected = expected.as_bytes();

    let mut diff = given.len() ^ expected.len();
    for (i, &byte) in expected.iter().enumerate() {
        let other = given.get(i).copied().unwrap_or(0);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches("abc", "abc"));
        assert!(!secret_matches("abd", "abc"));
        assert!(!secret_matches("ab", "abc"));
        assert!(!secret_matches("abcd", "abc"));
        assert!(!secret_matches("", "abc"));
        assert!(!secret_matches("", ""));
        assert!(!secret_matches("abc", ""));
    }
}

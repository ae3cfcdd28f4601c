//! Formats raw keys and values for log and error messages.

use itertools::Itertools as _;

/// Formats raw bytes as an escaped ASCII string.
pub fn bytes(bytes: &[u8]) -> String {
    let escaped = bytes
        .iter()
        .copied()
        .flat_map(std::ascii::escape_default)
        .collect_vec();
    format!("\"{}\"", String::from_utf8_lossy(&escaped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_bytes() {
        assert_eq!(bytes(b"abc"), "\"abc\"");
    }

    #[test]
    fn test_escapes_control_bytes() {
        assert_eq!(bytes(b"a\x00b"), "\"a\\x00b\"");
    }
}

//! Small parsing utilities shared by the request parser and the chunked
//! body decoder: decimal `Content-Length` values and hex chunk sizes.

/// Parses a `Content-Length` value: one or more ASCII digits, no sign, no
/// leading `+`, no whitespace, no overflow. Anything else is rejected —
/// callers should treat a `None` result as `malformed_request`.
pub fn parse_content_length(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok()
}

/// Parses a chunk-size line (the part before any `;extension`) as hex,
/// per RFC 7230 §4.1. Case-insensitive, no `0x` prefix, no sign.
pub fn parse_chunk_size(s: &str) -> Option<u64> {
    let size_part = s.split(';').next().unwrap_or("").trim();
    if size_part.is_empty() || !size_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(size_part, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_basic() {
        assert_eq!(parse_content_length("0"), Some(0));
        assert_eq!(parse_content_length("42"), Some(42));
    }

    #[test]
    fn content_length_rejects_garbage() {
        assert_eq!(parse_content_length(""), None);
        assert_eq!(parse_content_length("+5"), None);
        assert_eq!(parse_content_length("-5"), None);
        assert_eq!(parse_content_length("5.0"), None);
        assert_eq!(parse_content_length(" 5"), None);
        assert_eq!(parse_content_length("5 "), None);
    }

    #[test]
    fn chunk_size_hex() {
        assert_eq!(parse_chunk_size("1a"), Some(26));
        assert_eq!(parse_chunk_size("0"), Some(0));
        assert_eq!(parse_chunk_size("FF"), Some(255));
    }

    #[test]
    fn chunk_size_with_extension() {
        assert_eq!(parse_chunk_size("1a;foo=bar"), Some(26));
    }

    #[test]
    fn chunk_size_rejects_garbage() {
        assert_eq!(parse_chunk_size(""), None);
        assert_eq!(parse_chunk_size("xyz"), None);
    }
}

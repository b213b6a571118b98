/// Used when the client sent no original name at all
pub const FALLBACK_NAME: &str = "blob";

/// Replace every char outside `[A-Za-z0-9.-]` with `_`
pub fn sanitize(original: &str) -> String {
    original
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Stored name: `{millis}-{sanitized original}`
pub fn stored_name(timestamp_ms: i64, original: Option<&str>) -> String {
    let original = original.filter(|s| !s.is_empty()).unwrap_or(FALLBACK_NAME);
    format!("{}-{}", timestamp_ms, sanitize(original))
}

/// A stored name must address a single file directly under the root
pub fn validate_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("recording-2024.webm"), "recording-2024.webm");
        assert_eq!(sanitize("my clip (1).webm"), "my_clip__1_.webm");
        assert_eq!(sanitize("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize("résumé.webm"), "r_sum_.webm");
    }

    #[test]
    fn test_stored_name() {
        assert_eq!(
            stored_name(1705320000000, Some("a b.webm")),
            "1705320000000-a_b.webm"
        );
        assert_eq!(stored_name(1, None), "1-blob");
        assert_eq!(stored_name(1, Some("")), "1-blob");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("1705320000000-rec.webm"));
        assert!(!validate_name("../database.db"));
        assert!(!validate_name("a/b.webm"));
        assert!(!validate_name("a\\b.webm"));
        assert!(!validate_name(""));
        assert!(!validate_name(".."));
        assert!(validate_name(&stored_name(5, Some("x/y z.webm"))));
        assert!(validate_name(&stored_name(5, Some("../etc/passwd"))));
    }
}

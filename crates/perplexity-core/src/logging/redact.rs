//! Credential scrubbing for log lines and user-visible errors

const MASK: &str = "***";

/// Replace every occurrence of `secret` in `text` with a mask.
///
/// Empty or very short secrets are ignored so that stray one-character
/// "keys" cannot garble unrelated text.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.len() < 4 {
        return text.to_string();
    }
    text.replace(secret, MASK)
}

/// Short non-reversible description of a key for diagnostics
pub fn describe_key(key: Option<&str>) -> String {
    match key {
        Some(k) if !k.is_empty() => format!("present (len={})", k.len()),
        _ => "missing".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_masks_all_occurrences() {
        let out = redact("key pplx-abc123 rejected; pplx-abc123 invalid", "pplx-abc123");
        assert_eq!(out, "key *** rejected; *** invalid");
    }

    #[test]
    fn test_redact_ignores_short_secret() {
        assert_eq!(redact("a b c", "b"), "a b c");
    }

    #[test]
    fn test_describe_key() {
        assert_eq!(describe_key(Some("pplx-1234")), "present (len=9)");
        assert_eq!(describe_key(Some("")), "missing");
        assert_eq!(describe_key(None), "missing");
    }
}

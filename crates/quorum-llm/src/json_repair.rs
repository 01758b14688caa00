use serde::de::DeserializeOwned;

use crate::error::{GatewayError, Result};

/// Strip common artifacts models wrap JSON in: surrounding ```json fences,
/// a leading/trailing prose sentence, and a trailing comma before a closing
/// bracket. Applied once, after a first strict parse attempt fails.
fn repair(raw: &str) -> String {
    let mut s = raw.trim();

    if let Some(start) = s.find("```") {
        if let Some(rel_end) = s[start + 3..].find("```") {
            let end = start + 3 + rel_end;
            let fenced = &s[start + 3..end];
            s = fenced.trim_start_matches("json").trim();
        }
    }

    if let (Some(obj_start), Some(obj_end)) = (s.find(['{', '[']), s.rfind(['}', ']'])) {
        if obj_start < obj_end {
            s = &s[obj_start..=obj_end];
        }
    }

    let mut cleaned = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            let mut lookahead = chars.clone();
            while matches!(lookahead.peek(), Some(c) if c.is_whitespace()) {
                lookahead.next();
            }
            if matches!(lookahead.peek(), Some('}') | Some(']')) {
                continue;
            }
        }
        cleaned.push(c);
    }
    cleaned
}

/// Parse a `json_mode` response strictly; on failure attempt a single
/// repair pass before surfacing `bad_json`.
pub fn parse_json_mode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    if let Ok(value) = serde_json::from_str::<T>(raw) {
        return Ok(value);
    }
    let repaired = repair(raw);
    serde_json::from_str::<T>(&repaired)
        .map_err(|e| GatewayError::BadJson(format!("{e} (after repair pass)")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn parses_clean_json_directly() {
        let raw = r#"{"a":1,"b":"x"}"#;
        let parsed: Sample = parse_json_mode(raw).unwrap();
        assert_eq!(parsed, Sample { a: 1, b: "x".into() });
    }

    #[test]
    fn repairs_fenced_json_with_trailing_comma() {
        let raw = "Sure, here you go:\n```json\n{\"a\": 1, \"b\": \"x\",}\n```";
        let parsed: Sample = parse_json_mode(raw).unwrap();
        assert_eq!(parsed, Sample { a: 1, b: "x".into() });
    }

    #[test]
    fn surfaces_bad_json_when_unrepairable() {
        let raw = "not json at all";
        let err = parse_json_mode::<Sample>(raw).unwrap_err();
        assert!(matches!(err, GatewayError::BadJson(_)));
    }
}

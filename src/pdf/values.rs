use serde_json::Value;

/// Escape raw control characters that appear inside JSON string literals.
///
/// Characters outside strings are left alone, so structural whitespace
/// keeps parsing normally.
pub fn sanitize_json(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                c if c.is_control() && (c as u32) < 0x80 => {
                    out.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => out.push(c),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }

    out
}

/// Control characters become `_`, runs of spaces collapse to one, ends are trimmed
pub fn sanitize_field_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c.is_ascii_control() { '_' } else { c })
        .collect();
    replaced
        .split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a JSON value as the text written into a form field
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                format!("{:.2}", n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn is_checked(value: &str) -> bool {
    value == "true" || value == "Yes"
}

/// Boolean-looking text is written as `Yes`/`No`
pub(crate) fn text_value(value: &str) -> &str {
    match value {
        "true" | "Yes" => "Yes",
        "false" | "No" => "No",
        other => other,
    }
}

/// Export value matching `value` after trimming, ignoring case
pub(crate) fn radio_choice<'a>(value: &str, options: &'a [String]) -> Option<&'a str> {
    let wanted = value.trim().to_lowercase();
    options
        .iter()
        .find(|option| option.trim().to_lowercase() == wanted)
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_sanitize_json_escapes_inside_strings_only() {
        let raw = "{\n  \"Name\": \"line1\nline2\",\n  \"Tab\": \"a\tb\"\n}";
        let clean = sanitize_json(raw);
        assert_eq!(
            clean,
            "{\n  \"Name\": \"line1\\u000aline2\",\n  \"Tab\": \"a\\u0009b\"\n}"
        );
        let parsed: Value = serde_json::from_str(&clean).unwrap();
        assert_eq!(parsed["Name"], json!("line1\nline2"));
    }

    #[test]
    fn test_sanitize_json_respects_escaped_quotes() {
        let raw = r#"{"a": "say \"hi\"", "b": 1}"#;
        assert_eq!(sanitize_json(raw), raw);
    }

    #[rstest]
    #[case("  Full   Name ", "Full Name")]
    #[case("Tab\there", "Tab_here")]
    #[case("plain", "plain")]
    #[case("a\u{0}b", "a_b")]
    fn test_sanitize_field_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_field_name(input), expected);
    }

    #[rstest]
    #[case(json!(null), "")]
    #[case(json!(true), "true")]
    #[case(json!(false), "false")]
    #[case(json!(42), "42")]
    #[case(json!(-7), "-7")]
    #[case(json!(3.14159), "3.14")]
    #[case(json!(2.5), "2.50")]
    #[case(json!("text"), "text")]
    fn test_normalize_value(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(normalize_value(&value), expected);
    }

    #[test]
    fn test_text_value_maps_booleans() {
        assert_eq!(text_value("true"), "Yes");
        assert_eq!(text_value("No"), "No");
        assert_eq!(text_value("false"), "No");
        assert_eq!(text_value("maybe"), "maybe");
    }

    #[test]
    fn test_checked_values() {
        assert!(is_checked("true"));
        assert!(is_checked("Yes"));
        assert!(!is_checked("yes"));
        assert!(!is_checked("On"));
    }

    #[test]
    fn test_radio_choice_is_case_insensitive() {
        let options = vec!["Alpha".to_string(), "Beta ".to_string()];
        assert_eq!(radio_choice(" alpha", &options), Some("Alpha"));
        assert_eq!(radio_choice("BETA", &options), Some("Beta "));
        assert_eq!(radio_choice("gamma", &options), None);
    }
}

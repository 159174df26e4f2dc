//! `{key}` placeholder substitution shared by prompts and advisors.

use std::collections::HashMap;

/// Substitute `{key}` placeholders in one pass.
///
/// Placeholders without a matching parameter, and braces in substituted
/// values, are left untouched.
pub fn render(template: &str, params: &HashMap<String, String>) -> String {
    if params.is_empty() {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if params.contains_key(&after[..close]) => {
                out.push_str(&params[&after[..close]]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_placeholders() {
        let rendered = render(
            "Plan {days} days in {city}",
            &params(&[("days", "3"), ("city", "Paris")]),
        );
        assert_eq!(rendered, "Plan 3 days in Paris");
    }

    #[test]
    fn leaves_unknown_and_json_braces_alone() {
        let p = params(&[("name", "Ada")]);
        assert_eq!(render("Hi {name}, {unknown}", &p), "Hi Ada, {unknown}");
        assert_eq!(render(r#"{"a": {name}}"#, &p), r#"{"a": Ada}"#);
        assert_eq!(render("dangling {name", &p), "dangling {name");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let p = params(&[("a", "{b}"), ("b", "x")]);
        assert_eq!(render("{a}", &p), "{b}");
    }

    #[test]
    fn no_params_is_identity() {
        assert_eq!(render("{city}", &HashMap::new()), "{city}");
    }
}

//! Structured output: JSON Schema generation and lenient JSON parsing.

use std::marker::PhantomData;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use spindle_core::{Error, Result};

/// Converts model text into a typed value.
///
/// The schema is generated once from `T` with `schemars`. Parsing tolerates
/// markdown code fences and, for string-like targets such as unit enums, a
/// bare unquoted word.
pub struct JsonOutputConverter<T> {
    schema: Value,
    _target: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + JsonSchema> Default for JsonOutputConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + JsonSchema> JsonOutputConverter<T> {
    pub fn new() -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
        Self {
            schema,
            _target: PhantomData,
        }
    }

    pub fn json_schema(&self) -> &Value {
        &self.schema
    }

    /// Instructions appended to the user message.
    pub fn format_instructions(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.schema).unwrap_or_default();
        format!(
            "Your response should be in JSON format.\n\
             Do not include any explanations, only provide a RFC8259 compliant JSON response following this format without deviation.\n\
             Do not include markdown code blocks in your response.\n\
             Here is the JSON Schema instance your output must adhere to:\n{schema}"
        )
    }

    /// An OpenAI-style `json_schema` response format.
    ///
    /// Only object schemas qualify; for anything else the format
    /// instructions alone carry the contract.
    pub fn response_format(&self) -> Option<Value> {
        if self.schema.get("type").and_then(Value::as_str) != Some("object") {
            return None;
        }
        Some(json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema_name::<T>(),
                "schema": self.schema,
                "strict": false,
            }
        }))
    }

    /// Parse model output. Never returns a partially populated value.
    pub fn parse(&self, text: &str) -> Result<T> {
        let body = strip_fences(text);
        match serde_json::from_str::<T>(body) {
            Ok(value) => Ok(value),
            Err(first) => {
                // A bare word like `POSITIVE` for an enum target.
                let word = body.trim_matches('"');
                serde_json::from_value::<T>(Value::String(word.to_string())).map_err(|_| {
                    Error::StructuredOutputParse {
                        target: std::any::type_name::<T>().to_string(),
                        reason: first.to_string(),
                    }
                })
            }
        }
    }
}

fn schema_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    short
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

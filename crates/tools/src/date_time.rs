//! Current date/time tool.
//!
//! Lets the model answer relative-date questions ("what day is tomorrow?")
//! without guessing from its training cutoff.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use spindle_core::error::ToolError;
use spindle_core::tool::{Tool, ToolResult};

pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "current_date_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time, optionally in a fixed UTC offset such as +02:00"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "utc_offset": {
                    "type": "string",
                    "description": "Offset from UTC as +HH:MM or -HH:MM (default: +00:00)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let offset = match arguments["utc_offset"].as_str() {
            Some(raw) => parse_offset(raw)?,
            None => utc(),
        };
        Ok(ToolResult::json(describe(Utc::now(), offset)))
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn parse_offset(raw: &str) -> Result<FixedOffset, ToolError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }
    let invalid = || ToolError::InvalidArguments(format!("Invalid utc_offset '{raw}'"));

    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn describe(now: DateTime<Utc>, offset: FixedOffset) -> serde_json::Value {
    let local = now.with_timezone(&offset);
    let tomorrow = local + Duration::days(1);
    serde_json::json!({
        "iso8601": local.to_rfc3339(),
        "date": local.format("%Y-%m-%d").to_string(),
        "time": local.format("%H:%M:%S").to_string(),
        "weekday": local.format("%A").to_string(),
        "tomorrow": tomorrow.format("%A, %Y-%m-%d").to_string(),
        "utc_offset": offset.to_string(),
    })
}

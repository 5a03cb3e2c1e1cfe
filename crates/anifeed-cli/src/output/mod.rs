//! Output formatting for the anifeed CLI.
//!
//! Every command result is serialized once and rendered either as pretty
//! JSON or as one concise text line per record.

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON format - machine-readable output
    Json,
    /// Plain text format - one record per line
    #[default]
    Text,
}

/// Identifier fields rendered first, without a label.
const ID_KEYS: [&str; 4] = ["id", "activity_id", "comment_id", "user_id"];

/// Formatter that renders data in text or JSON format
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format data according to the configured output format
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
            OutputFormat::Text => {
                let json_value = serde_json::to_value(data)?;
                Ok(render_text(&json_value))
            }
        }
    }

    /// Format and print data to stdout
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        let output = self.format(data)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{output}")?;
        Ok(())
    }

    /// Format and print a list with a custom empty message
    ///
    /// For JSON, wraps the array in a named object with a count.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print_list<T: Serialize>(
        &self,
        data: &[T],
        empty_message: &str,
        collection_name: &str,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let mut envelope = serde_json::Map::new();
                envelope.insert(collection_name.to_string(), serde_json::to_value(data)?);
                envelope.insert("count".to_string(), serde_json::json!(data.len()));
                self.print(&serde_json::Value::Object(envelope))
            }
            OutputFormat::Text => {
                if data.is_empty() {
                    let mut stdout = io::stdout().lock();
                    writeln!(stdout, "{empty_message}")?;
                    Ok(())
                } else {
                    self.print(&data)
                }
            }
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

/// Render a JSON value as concise text
fn render_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut parts = Vec::new();

            for key in &ID_KEYS {
                if let Some(val) = map.get(*key) {
                    parts.push(render_field_value(val));
                }
            }

            for (key, val) in map {
                if ID_KEYS.contains(&key.as_str()) {
                    continue;
                }
                match val {
                    serde_json::Value::Array(arr) if arr.is_empty() => {}
                    serde_json::Value::Null => {}
                    _ => parts.push(format!("{key}:{}", render_field_value(val))),
                }
            }
            parts.join("  ")
        }
        serde_json::Value::Array(arr) => arr.iter().map(render_text).collect::<Vec<_>>().join("\n"),
        _ => render_field_value(value),
    }
}

/// Render a single field value as concise text
fn render_field_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => {
            if s.contains(' ') || s.contains('\n') {
                format!("\"{}\"", s.replace('\n', "\\n"))
            } else {
                s.clone()
            }
        }
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(render_field_value).collect();
            format!("[{}]", items.join(","))
        }
        serde_json::Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| format!("{k}:{}", render_field_value(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize)]
    struct Row {
        user_id: i64,
        username: String,
        display_name: Option<String>,
        tags: Vec<String>,
        id: i64,
    }

    fn sample() -> Row {
        Row {
            user_id: 7,
            username: "mika".to_string(),
            display_name: None,
            tags: vec![],
            id: 42,
        }
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
        assert_eq!(Formatter::default().format, OutputFormat::Text);
    }

    #[test]
    fn test_json_output_is_valid() {
        let output = Formatter::new(OutputFormat::Json).format(&sample()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["id"], 42);
        assert_eq!(parsed["username"], "mika");
        assert!(parsed["display_name"].is_null());
    }

    #[test]
    fn test_text_puts_ids_first_and_drops_empty() {
        let output = Formatter::new(OutputFormat::Text).format(&sample()).unwrap();
        assert!(output.starts_with("42  7"));
        assert!(output.contains("username:mika"));
        assert!(!output.contains("display_name"));
        assert!(!output.contains("tags"));
    }

    #[test]
    fn test_text_array_one_line_per_item() {
        let output = Formatter::new(OutputFormat::Text)
            .format(&vec![sample(), sample()])
            .unwrap();
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn test_text_quotes_and_nests() {
        let value = serde_json::json!({
            "id": 1,
            "content": "first line\nsecond",
            "engagement": {"likes_count": 3, "user_liked": null},
        });
        let output = render_text(&value);
        assert!(output.contains("content:\"first line\\nsecond\""));
        assert!(output.contains("engagement:{likes_count:3}"));
    }
}

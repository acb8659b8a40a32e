//! Stdout rendering (spec §6): a line-oriented `key: value` stream by
//! default, or a single JSON object with `--json`. Stderr is reserved for
//! `log`/`env_logger` diagnostics and is never written to here.

use std::io::Write;

/// Ordered `key: value` pairs — ordering matters for human readability,
/// hence `Vec` rather than a map.
pub struct Report {
    fields: Vec<(String, serde_json::Value)>,
}

impl Report {
    pub fn new() -> Self {
        Report { fields: Vec::new() }
    }

    pub fn field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn write(&self, json: bool, out: &mut impl Write) -> std::io::Result<()> {
        if json {
            let object: serde_json::Map<String, serde_json::Value> =
                self.fields.iter().cloned().collect();
            writeln!(out, "{}", serde_json::Value::Object(object))
        } else {
            for (key, value) in &self.fields {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                writeln!(out, "{key}: {rendered}")?;
            }
            Ok(())
        }
    }

    pub fn print(&self, json: bool) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = self.write(json, &mut lock);
    }
}

impl Default for Report {
    fn default() -> Self {
        Report::new()
    }
}

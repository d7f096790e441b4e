use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tach_core::{Params, Result, TachError};

/// One named block of `key = value` options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub items: Vec<(String, String)>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> Params {
        self.items.iter().cloned().collect()
    }

    fn set(&mut self, key: String, value: String) {
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.items.push((key, value)),
        }
    }
}

pub fn read_sections(path: impl AsRef<Path>) -> Result<Vec<Section>> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let contents = std::fs::read_to_string(path)?;

    let extension = path.extension().and_then(|s| s.to_str());

    match extension {
        Some("yaml") | Some("yml") => parse_document(&contents, "yaml", &origin),
        Some("toml") => parse_document(&contents, "toml", &origin),
        Some("json") => parse_document(&contents, "json", &origin),
        _ => Err(parse_error(
            &origin,
            "unsupported file format. Use .toml, .yaml, .yml, or .json",
        )),
    }
}

pub fn parse_sections(content: &str, format: &str) -> Result<Vec<Section>> {
    parse_document(content, &format.to_lowercase(), "<string>")
}

fn parse_document(content: &str, format: &str, origin: &str) -> Result<Vec<Section>> {
    let document: Value = match format {
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| parse_error(origin, e))?,
        "toml" => toml::from_str(content).map_err(|e| parse_error(origin, e))?,
        "json" => serde_json::from_str(content).map_err(|e| parse_error(origin, e))?,
        other => return Err(parse_error(origin, format!("unsupported format: {}", other))),
    };

    let root = match document {
        Value::Object(root) => root,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(parse_error(
                origin,
                format!("expected a table of sections, found {}", describe(&other)),
            ))
        }
    };

    let mut sections = Vec::new();
    for (name, value) in root {
        collect(name, value, origin, &mut sections)?;
    }
    Ok(sections)
}

/// Flatten a table into `sections`; nested tables become `parent.child`.
/// A table holding only other tables does not produce a section of its own.
fn collect(name: String, value: Value, origin: &str, sections: &mut Vec<Section>) -> Result<()> {
    let table = match value {
        Value::Object(table) => table,
        other => {
            return Err(parse_error(
                origin,
                format!("'{}' must be a section, found {}", name, describe(&other)),
            ))
        }
    };

    let mut section = Section::new(name.clone());
    let mut nested = Vec::new();

    for (key, value) in table {
        let text = match value {
            Value::Object(_) => {
                nested.push((key, value));
                continue;
            }
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(parse_error(
                    origin,
                    format!(
                        "option '{}' in section '{}' must be a scalar, found {}",
                        key,
                        name,
                        describe(&other)
                    ),
                ))
            }
        };
        section.set(key.to_lowercase(), text);
    }

    if !section.items.is_empty() || nested.is_empty() {
        sections.push(section);
    }

    for (key, value) in nested {
        collect(format!("{}.{}", name, key), value, origin, sections)?;
    }

    Ok(())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a table",
    }
}

fn parse_error(origin: &str, reason: impl ToString) -> TachError {
    TachError::Parse {
        origin: origin.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[graphite.config]
carbon_host = "127.0.0.1"
carbon_port = 2003

["notifier:statsd"]
driver = "statsd"
host = "localhost"
port = 8125

[nova_api]
module = "nova.api.Controller"
method = "show"
Metric = "exec_time"
"#;

        let sections = parse_sections(toml, "toml").unwrap();
        assert_eq!(names(&sections), vec!["graphite.config", "notifier:statsd", "nova_api"]);
        assert_eq!(sections[0].get("carbon_port"), Some("2003"));
        assert_eq!(sections[2].get("metric"), Some("exec_time"));
        assert_eq!(sections[2].get("Metric"), None);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
statsd:
  config:
    statsd_host: localhost
    statsd_port: 8125
lookup:
  module: demo.inventory
  method: lookup
  metric: increment
  increment: -2
  enabled: true
"#;

        let sections = parse_sections(yaml, "yaml").unwrap();
        assert_eq!(names(&sections), vec!["statsd.config", "lookup"]);
        assert_eq!(sections[1].get("increment"), Some("-2"));
        assert_eq!(sections[1].get("enabled"), Some("true"));
        assert_eq!(sections[1].params().len(), 5);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"
{
  "notifier": {},
  "checkout": {"module": "demo.Cart", "method": "checkout", "metric": "timer"}
}
"#;

        let sections = parse_sections(json, "JSON").unwrap();
        assert_eq!(names(&sections), vec!["notifier", "checkout"]);
        assert!(sections[0].items.is_empty());
    }

    #[test]
    fn test_empty_yaml_document() {
        assert!(parse_sections("", "yaml").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_scalar_options() {
        let err = parse_sections("[a]\nmodule = [\"x\"]\n", "toml").unwrap_err();
        assert!(matches!(err, TachError::Parse { .. }));
        assert!(err.to_string().contains("must be a scalar"));

        let err = parse_sections("[1, 2]", "json").unwrap_err();
        assert!(err.to_string().contains("table of sections"));

        let err = parse_sections("top = 1\n", "toml").unwrap_err();
        assert!(err.to_string().contains("'top' must be a section"));
    }

    #[test]
    fn test_unsupported_format() {
        let err = parse_sections("", "ini").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_section_builder_overwrites() {
        let section = Section::new("s").with("k", "1").with("k", "2");
        assert_eq!(section.items, vec![("k".to_string(), "2".to_string())]);
    }
}

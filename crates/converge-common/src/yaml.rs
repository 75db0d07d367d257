//! Manifest decoding using yaml-rust2
//!
//! Documents are converted to `serde_json::Value` so typed Kubernetes objects
//! can be deserialized with serde afterwards. JSON input is accepted as-is.

use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

use crate::Error;

/// Parse a YAML string into one `serde_json::Value` per document.
///
/// Documents separated by `---` become separate values; empty documents
/// come back as `Value::Null`.
pub fn parse_yaml_multi(input: &str) -> Result<Vec<Value>, Error> {
    let docs = YamlLoader::load_from_str(input)
        .map_err(|e| Error::serialization(format!("invalid YAML: {}", e)))?;
    docs.into_iter().map(yaml_to_json).collect()
}

/// Parse a manifest that must contain exactly one resource.
///
/// Input starting with `{` is parsed as JSON, everything else as YAML.
/// Empty YAML documents (e.g. a leading `---`) are ignored; more than one
/// non-empty document is rejected.
pub fn parse_single_document(input: &str) -> Result<Value, Error> {
    if input.trim_start().starts_with('{') {
        return serde_json::from_str(input)
            .map_err(|e| Error::serialization(format!("invalid JSON: {}", e)));
    }

    let mut docs: Vec<Value> = parse_yaml_multi(input)?
        .into_iter()
        .filter(|doc| !doc.is_null())
        .collect();

    match docs.len() {
        1 => Ok(docs.remove(0)),
        0 => Err(Error::serialization("manifest contains no documents")),
        n => Err(Error::serialization(format!(
            "manifest contains {} documents, expected exactly one",
            n
        ))),
    }
}

fn yaml_to_json(yaml: Yaml) -> Result<Value, Error> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|e| Error::serialization(format!("invalid number {}: {}", s, e)))?;
            Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(items) => items
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(map) => map
            .into_iter()
            .map(|(k, v)| {
                let key = match k {
                    Yaml::String(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Real(r) => r,
                    Yaml::Boolean(b) => b.to_string(),
                    Yaml::Null => "null".to_string(),
                    _ => return Err(Error::serialization("unsupported YAML key type")),
                };
                yaml_to_json(v).map(|v| (key, v))
            })
            .collect::<Result<Map<String, Value>, _>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(Error::serialization("YAML aliases not supported")),
        Yaml::BadValue => Err(Error::serialization("bad YAML value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_deployment_yaml() {
        let doc = parse_single_document(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 3
  template:
    metadata:
      labels:
        app: web
"#,
        )
        .expect("single deployment should parse");

        assert_eq!(doc["kind"], "Deployment");
        assert_eq!(doc["spec"]["replicas"], 3);
        assert_eq!(doc["spec"]["template"]["metadata"]["labels"]["app"], "web");
    }

    #[test]
    fn test_parses_json() {
        let doc = parse_single_document(r#"{"apiVersion":"apps/v1","kind":"Deployment"}"#)
            .expect("JSON should parse");
        assert_eq!(doc["apiVersion"], "apps/v1");
    }

    #[test]
    fn test_leading_separator_is_ignored() {
        let doc = parse_single_document("---\nkind: Deployment\n")
            .expect("leading separator yields one document");
        assert_eq!(doc["kind"], "Deployment");
    }

    #[test]
    fn test_rejects_multiple_documents() {
        let err = parse_single_document("kind: Deployment\n---\nkind: Service\n")
            .expect_err("two documents are rejected");
        assert!(err.to_string().contains("2 documents"));
    }

    #[test]
    fn test_rejects_empty_input() {
        let err = parse_single_document("").expect_err("empty input is rejected");
        assert!(err.to_string().contains("no documents"));
    }

    #[test]
    fn test_rejects_invalid_yaml() {
        assert!(parse_single_document("not: valid: yaml: {{").is_err());
    }

    #[test]
    fn test_rejects_invalid_json() {
        assert!(parse_single_document("{not valid json").is_err());
    }

    #[test]
    fn test_numeric_keys_become_strings() {
        let docs = parse_yaml_multi("1: one\ntrue: yes\n").expect("scalar keys should parse");
        assert_eq!(docs[0]["1"], "one");
        assert_eq!(docs[0]["true"], "yes");
    }
}

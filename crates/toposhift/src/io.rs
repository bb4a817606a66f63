//! Reading topologies and answers from disk, and writing results.

use clap::ValueEnum;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use toposhift_common::{Error, Result};
use toposhift_topology::{validate_topology, validate_topology_json, Topology};
use tracing::{debug, warn};

/// Output encoding for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    /// Operator runbook; plans only.
    Markdown,
}

/// Input encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputFormat {
    Json,
    Yaml,
}

impl InputFormat {
    fn of(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(InputFormat::Json),
            Some("yaml") | Some("yml") => Ok(InputFormat::Yaml),
            _ => Err(Error::Config(format!(
                "Unsupported file type (expected .json, .yaml or .yml): {}",
                path.display()
            ))),
        }
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = InputFormat::of(path)?;
    let content = fs::read_to_string(path)?;
    let document = match format {
        InputFormat::Json => serde_json::from_str(&content)?,
        InputFormat::Yaml => serde_yaml::from_str(&content)?,
    };
    Ok(document)
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load a topology and run schema and referential checks on it.
pub fn load_topology(path: &Path) -> Result<Topology> {
    let value: Value = read_document(path)?;

    let schema = validate_topology_json(&value)
        .map_err(|e| Error::SchemaValidation(e.to_string()))?;
    if !schema.valid {
        return Err(Error::SchemaValidation(join(&schema.errors)));
    }

    let topology: Topology = serde_json::from_value(value)?;
    let result = validate_topology(&topology);
    for warning in &result.warnings {
        warn!("{}: {}", topology.name, warning);
    }
    if !result.valid {
        return Err(Error::InvalidTopology {
            topology: topology.id.clone(),
            reason: join(&result.errors),
        });
    }

    debug!(
        "Loaded topology {} ({} hosts, {} images, {} wires)",
        topology.id,
        topology.hosts().len(),
        topology.image_count(),
        topology.wires.len()
    );
    Ok(topology)
}

/// Load a `decision id -> answer` map. Scalar answers are taken as text.
pub fn load_answers(path: &Path) -> Result<HashMap<String, String>> {
    let raw: HashMap<String, Value> = read_document(path)?;
    raw.into_iter()
        .map(|(id, value)| {
            let answer = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(Error::Config(format!(
                        "Answer for {} must be a string, number or boolean",
                        id
                    )))
                }
            };
            Ok((id, answer))
        })
        .collect()
}

/// Encode a value as JSON or YAML.
pub fn to_document<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        OutputFormat::Markdown => Err(Error::Config(
            "Markdown output is only available for plans".to_string(),
        )),
    }
}

/// Write to a file, or to stdout when no path is given.
pub fn write_output(content: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => fs::write(path, content)?,
        None => println!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TOPOLOGY_JSON: &str = r#"{
        "id": "t1",
        "name": "prod",
        "containers": [{
            "id": "h1",
            "name": "main",
            "kind": "host",
            "images": [
                {
                    "id": "db",
                    "name": "postgres",
                    "kind": "database",
                    "ports": [{"id": "db-in", "name": "sql", "portType": "database", "direction": "in"}]
                },
                {
                    "id": "app",
                    "name": "hub",
                    "kind": "hub-server",
                    "ports": [{"id": "app-db", "name": "db", "portType": "database", "direction": "out"}]
                }
            ]
        }],
        "wires": [{
            "id": "w1",
            "sourceNodeId": "app",
            "sourcePortId": "app-db",
            "targetNodeId": "db",
            "targetPortId": "db-in"
        }]
    }"#;

    const TOPOLOGY_YAML: &str = r#"
id: t2
name: staging
containers:
  - id: h1
    name: main
    kind: host
    config:
      region: $REGION
    images:
      - id: cache
        name: redis
        kind: cache
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_json_topology() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "prod.json", TOPOLOGY_JSON);

        let topology = load_topology(&path).unwrap();
        assert_eq!(topology.id, "t1");
        assert_eq!(topology.image_count(), 2);
        assert_eq!(topology.wires.len(), 1);
    }

    #[test]
    fn test_load_yaml_topology() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "staging.yml", TOPOLOGY_YAML);

        let topology = load_topology(&path).unwrap();
        assert_eq!(topology.name, "staging");
        assert_eq!(topology.hosts()[0].config["region"], "$REGION");
    }

    #[test]
    fn test_schema_failure() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.json", r#"{"id": "t", "name": "x", "containers": [{"id": "c"}]}"#);

        let err = load_topology(&path).unwrap_err();
        assert!(matches!(err, Error::SchemaValidation(_)));
    }

    #[test]
    fn test_referential_failure() {
        let dir = TempDir::new().unwrap();
        let broken = TOPOLOGY_JSON.replace(r#""targetNodeId": "db""#, r#""targetNodeId": "app""#);
        let path = write(&dir, "loop.json", &broken);

        match load_topology(&path) {
            Err(Error::InvalidTopology { topology, reason }) => {
                assert_eq!(topology, "t1");
                assert!(reason.contains("w1"));
            }
            other => panic!("expected invalid topology, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "prod.toml", "id = 't'");

        assert!(matches!(load_topology(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_answers() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "answers.yaml",
            "dns-cutover: manual\n\"variable:REPLICAS\": 3\n",
        );

        let answers = load_answers(&path).unwrap();
        assert_eq!(answers["dns-cutover"], "manual");
        assert_eq!(answers["variable:REPLICAS"], "3");

        let nested = write(&dir, "nested.json", r#"{"dns-cutover": {"key": "manual"}}"#);
        assert!(matches!(load_answers(&nested), Err(Error::Config(_))));
    }

    #[test]
    fn test_markdown_is_plan_only() {
        let value = serde_json::json!({"a": 1});
        assert!(to_document(&value, OutputFormat::Json).unwrap().contains("\"a\": 1"));
        assert_eq!(to_document(&value, OutputFormat::Yaml).unwrap(), "a: 1\n");
        assert!(to_document(&value, OutputFormat::Markdown).is_err());
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.md");

        write_output("# Plan\n", Some(&path)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Plan\n");
    }
}

//! Topology validation utilities.
//!
//! The engine assumes referentially valid graphs. These checks run
//! before a topology is handed to it.

use crate::schema;
use crate::topology::{Container, Image, Port, Topology};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Validation error type.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Schema validation failed: {0}")]
    SchemaError(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Duplicate port id: {0}")]
    DuplicatePortId(String),

    #[error("Wire {wire} references unknown node {node}")]
    UnknownNode { wire: String, node: String },

    #[error("Wire {wire} references port {port} which does not belong to node {node}")]
    ForeignPort {
        wire: String,
        node: String,
        port: String,
    },

    #[error("Wire {0} connects a node to itself")]
    SelfLoop(String),
}

/// Result of topology validation.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a raw topology document against the JSON schema.
pub fn validate_topology_json(topology: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = ValidationResult::new();

    let schema_value = schema::topology_schema();
    let compiled = JSONSchema::compile(&schema_value)
        .map_err(|e| ValidationError::SchemaError(e.to_string()))?;

    let validation = compiled.validate(topology);
    if let Err(errors) = validation {
        for error in errors {
            result.add_error(ValidationError::SchemaError(format!(
                "{} at {}",
                error, error.instance_path
            )));
        }
    }

    Ok(result)
}

/// Validate referential integrity of a parsed topology.
pub fn validate_topology(topology: &Topology) -> ValidationResult {
    let mut result = ValidationResult::new();

    // node id -> port ids owned by that node
    let mut node_ports: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut seen_ports: HashSet<&str> = HashSet::new();
    let mut image_hosts: Vec<(&Image, bool)> = Vec::new();

    for container in &topology.containers {
        index_container(
            container,
            false,
            &mut node_ports,
            &mut seen_ports,
            &mut image_hosts,
            &mut result,
        );
    }

    for (image, has_host) in image_hosts {
        if !has_host {
            result.add_warning(format!(
                "Image {} ({}) has no enclosing host and will be ignored",
                image.name, image.id
            ));
        }
    }

    for wire in &topology.wires {
        if wire.source_node_id == wire.target_node_id {
            result.add_error(ValidationError::SelfLoop(wire.id.clone()));
        }
        for (node, port) in [
            (&wire.source_node_id, &wire.source_port_id),
            (&wire.target_node_id, &wire.target_port_id),
        ] {
            match node_ports.get(node.as_str()) {
                None => result.add_error(ValidationError::UnknownNode {
                    wire: wire.id.clone(),
                    node: node.clone(),
                }),
                Some(ports) if !ports.contains(port.as_str()) => {
                    result.add_error(ValidationError::ForeignPort {
                        wire: wire.id.clone(),
                        node: node.clone(),
                        port: port.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    result
}

fn index_container<'a>(
    container: &'a Container,
    under_host: bool,
    node_ports: &mut HashMap<&'a str, HashSet<&'a str>>,
    seen_ports: &mut HashSet<&'a str>,
    image_hosts: &mut Vec<(&'a Image, bool)>,
    result: &mut ValidationResult,
) {
    let under_host = under_host || container.is_host();
    register_node(&container.id, &container.ports, node_ports, seen_ports, result);

    for image in &container.images {
        register_node(&image.id, &image.ports, node_ports, seen_ports, result);
        image_hosts.push((image, under_host));
    }

    for child in &container.children {
        index_container(child, under_host, node_ports, seen_ports, image_hosts, result);
    }
}

fn register_node<'a>(
    id: &'a str,
    ports: &'a [Port],
    node_ports: &mut HashMap<&'a str, HashSet<&'a str>>,
    seen_ports: &mut HashSet<&'a str>,
    result: &mut ValidationResult,
) {
    if node_ports.contains_key(id) {
        result.add_error(ValidationError::DuplicateNodeId(id.to_string()));
    }
    let owned = node_ports.entry(id).or_default();
    for port in ports {
        if !seen_ports.insert(port.id.as_str()) {
            result.add_error(ValidationError::DuplicatePortId(port.id.clone()));
        }
        owned.insert(port.id.as_str());
    }
}

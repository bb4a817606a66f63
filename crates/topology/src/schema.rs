//! JSON schema definitions for topology validation.

/// JSON Schema for a topology document.
pub const TOPOLOGY_SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "$id": "https://toposhift.dev/schemas/topology.json",
  "title": "Toposhift Topology",
  "type": "object",
  "required": ["id", "name"],
  "properties": {
    "id": { "type": "string", "minLength": 1 },
    "name": { "type": "string" },
    "containers": {
      "type": "array",
      "items": { "$ref": "#/definitions/container" }
    },
    "wires": {
      "type": "array",
      "items": { "$ref": "#/definitions/wire" }
    }
  },
  "definitions": {
    "config": {
      "type": "object"
    },
    "port": {
      "type": "object",
      "required": ["id", "name", "portType", "direction"],
      "properties": {
        "id": { "type": "string", "minLength": 1 },
        "name": { "type": "string" },
        "portType": {
          "type": "string",
          "enum": ["network", "database", "storage", "control", "generic"]
        },
        "direction": { "type": "string", "enum": ["in", "out", "in-out"] }
      }
    },
    "image": {
      "type": "object",
      "required": ["id", "name", "kind"],
      "properties": {
        "id": { "type": "string", "minLength": 1 },
        "name": { "type": "string" },
        "kind": {
          "type": "string",
          "enum": [
            "database", "cache", "object-store", "app-server",
            "hub-server", "federation-server", "media-server", "custom"
          ]
        },
        "ports": { "type": "array", "items": { "$ref": "#/definitions/port" } },
        "config": { "$ref": "#/definitions/config" }
      }
    },
    "container": {
      "type": "object",
      "required": ["id", "name", "kind"],
      "properties": {
        "id": { "type": "string", "minLength": 1 },
        "name": { "type": "string" },
        "kind": {
          "type": "string",
          "enum": ["host", "network", "reverse-proxy", "federation-group"]
        },
        "geometry": {
          "type": ["object", "null"],
          "properties": {
            "x": { "type": "number" },
            "y": { "type": "number" },
            "width": { "type": "number" },
            "height": { "type": "number" }
          }
        },
        "ports": { "type": "array", "items": { "$ref": "#/definitions/port" } },
        "images": { "type": "array", "items": { "$ref": "#/definitions/image" } },
        "children": { "type": "array", "items": { "$ref": "#/definitions/container" } },
        "config": { "$ref": "#/definitions/config" }
      }
    },
    "wire": {
      "type": "object",
      "required": ["id", "sourceNodeId", "sourcePortId", "targetNodeId", "targetPortId"],
      "properties": {
        "id": { "type": "string", "minLength": 1 },
        "sourceNodeId": { "type": "string" },
        "sourcePortId": { "type": "string" },
        "targetNodeId": { "type": "string" },
        "targetPortId": { "type": "string" }
      }
    }
  }
}"##;

/// Get the topology schema as a parsed JSON value.
pub fn topology_schema() -> serde_json::Value {
    serde_json::from_str(TOPOLOGY_SCHEMA).expect("Invalid topology schema")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_parses() {
        let schema = topology_schema();
        assert_eq!(schema["title"], "Toposhift Topology");
        assert!(schema["definitions"]["container"].is_object());
    }
}

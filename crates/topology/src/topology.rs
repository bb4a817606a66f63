//! Topology graph types - input to the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// String-keyed configuration attached to containers and images.
///
/// Ordered so that every scan over a config map is deterministic.
pub type ConfigMap = BTreeMap<String, serde_json::Value>;

/// A named infrastructure design graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// Opaque identifier assigned by the persistence layer.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Root containers, in editor order.
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Directed port-to-port connections.
    #[serde(default)]
    pub wires: Vec<Wire>,
}

impl Topology {
    /// Collect every container of kind Host, depth-first in tree order.
    pub fn hosts(&self) -> Vec<&Container> {
        let mut hosts = Vec::new();
        for container in &self.containers {
            container.collect_kind(ContainerKind::Host, &mut hosts);
        }
        hosts
    }

    /// Collect every container of the given kind, depth-first in tree order.
    pub fn containers_of_kind(&self, kind: ContainerKind) -> Vec<&Container> {
        let mut found = Vec::new();
        for container in &self.containers {
            container.collect_kind(kind, &mut found);
        }
        found
    }

    /// Total number of images anywhere in the tree.
    pub fn image_count(&self) -> usize {
        fn count(container: &Container) -> usize {
            container.images.len() + container.children.iter().map(count).sum::<usize>()
        }
        self.containers.iter().map(count).sum()
    }
}

/// Structural kind of a container node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerKind {
    Host,
    Network,
    ReverseProxy,
    FederationGroup,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Host => write!(f, "host"),
            ContainerKind::Network => write!(f, "network"),
            ContainerKind::ReverseProxy => write!(f, "reverse-proxy"),
            ContainerKind::FederationGroup => write!(f, "federation-group"),
        }
    }
}

/// Editor placement. Carried through serialization, never read by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A structural node that may hold images and child containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    pub name: String,
    pub kind: ContainerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub children: Vec<Container>,
    #[serde(default)]
    pub config: ConfigMap,
}

impl Container {
    /// Check if this container is a host.
    pub fn is_host(&self) -> bool {
        matches!(self.kind, ContainerKind::Host)
    }

    fn collect_kind<'a>(&'a self, kind: ContainerKind, out: &mut Vec<&'a Container>) {
        if self.kind == kind {
            out.push(self);
        }
        for child in &self.children {
            child.collect_kind(kind, out);
        }
    }
}

/// Semantic kind of a leaf compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageKind {
    Database,
    Cache,
    ObjectStore,
    AppServer,
    HubServer,
    FederationServer,
    MediaServer,
    Custom,
}

impl ImageKind {
    /// Stateful infrastructure whose data survives a move.
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            ImageKind::Database | ImageKind::Cache | ImageKind::ObjectStore
        )
    }

    /// Images that receive public traffic through the reverse proxy.
    pub fn is_ingress(&self) -> bool {
        matches!(
            self,
            ImageKind::AppServer | ImageKind::HubServer | ImageKind::FederationServer
        )
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageKind::Database => "database",
            ImageKind::Cache => "cache",
            ImageKind::ObjectStore => "object-store",
            ImageKind::AppServer => "app-server",
            ImageKind::HubServer => "hub-server",
            ImageKind::FederationServer => "federation-server",
            ImageKind::MediaServer => "media-server",
            ImageKind::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

/// A leaf compute unit deployed on a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub name: String,
    pub kind: ImageKind,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub config: ConfigMap,
}

/// Payload category carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortType {
    Network,
    Database,
    Storage,
    Control,
    Generic,
}

/// Direction of traffic through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortDirection {
    In,
    Out,
    InOut,
}

impl PortDirection {
    /// Ports that can be the destination of a wire.
    pub fn accepts_incoming(&self) -> bool {
        matches!(self, PortDirection::In | PortDirection::InOut)
    }
}

/// A named attachment point on a container or image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    pub name: String,
    pub port_type: PortType,
    pub direction: PortDirection,
}

/// A directed connection from one node's port to another node's port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wire {
    pub id: String,
    pub source_node_id: String,
    pub source_port_id: String,
    pub target_node_id: String,
    pub target_port_id: String,
}

//! Wire resolution over a single topology.
//!
//! Built once per diff and only read afterwards.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use toposhift_topology::{Container, ContainerKind, Image, Port, Topology, Wire};
use tracing::warn;

/// Config key on a proxied image naming the path it is served under.
pub const UPSTREAM_PATH_KEY: &str = "upstreamPath";

/// Any graph node that owns ports.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Container(&'a Container),
    Image(&'a Image),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> &'a str {
        match *self {
            NodeRef::Container(c) => &c.id,
            NodeRef::Image(i) => &i.id,
        }
    }

    pub fn ports(&self) -> &'a [Port] {
        match *self {
            NodeRef::Container(c) => &c.ports,
            NodeRef::Image(i) => &i.ports,
        }
    }

    pub fn as_image(&self) -> Option<&'a Image> {
        match *self {
            NodeRef::Image(i) => Some(i),
            NodeRef::Container(_) => None,
        }
    }

    fn port_named(&self, name: &str) -> Option<&'a Port> {
        self.ports().iter().find(|p| p.name == name)
    }
}

/// Read-only index of nodes, ports and wires.
pub struct WireResolver<'a> {
    nodes: HashMap<&'a str, NodeRef<'a>>,
    ports: HashMap<&'a str, &'a Port>,
    port_owner: HashMap<&'a str, &'a str>,
    hosts: HashMap<&'a str, &'a Container>,
    graph: DiGraph<&'a str, &'a Wire>,
    indices: HashMap<&'a str, NodeIndex>,
}

impl<'a> WireResolver<'a> {
    /// Index a topology in one pass over its tree and wires.
    pub fn new(topology: &'a Topology) -> Self {
        let mut resolver = WireResolver {
            nodes: HashMap::new(),
            ports: HashMap::new(),
            port_owner: HashMap::new(),
            hosts: HashMap::new(),
            graph: DiGraph::new(),
            indices: HashMap::new(),
        };

        for container in &topology.containers {
            resolver.index_container(container, None);
        }

        for wire in &topology.wires {
            let from = resolver.indices.get(wire.source_node_id.as_str()).copied();
            let to = resolver.indices.get(wire.target_node_id.as_str()).copied();
            match (from, to) {
                (Some(from), Some(to)) => {
                    resolver.graph.add_edge(from, to, wire);
                }
                _ => warn!("Skipping wire {} with unknown endpoint", wire.id),
            }
        }

        resolver
    }

    fn index_container(&mut self, container: &'a Container, host: Option<&'a Container>) {
        let host = if container.is_host() {
            Some(container)
        } else {
            host
        };
        self.index_node(NodeRef::Container(container), host);
        for image in &container.images {
            self.index_node(NodeRef::Image(image), host);
        }
        for child in &container.children {
            self.index_container(child, host);
        }
    }

    fn index_node(&mut self, node: NodeRef<'a>, host: Option<&'a Container>) {
        let id = node.id();
        self.nodes.insert(id, node);
        for port in node.ports() {
            self.ports.insert(&port.id, port);
            self.port_owner.insert(&port.id, id);
        }
        if let Some(host) = host {
            self.hosts.insert(id, host);
        }
        let idx = self.graph.add_node(id);
        self.indices.insert(id, idx);
    }

    /// Look up any node by id.
    pub fn node(&self, node_id: &str) -> Option<NodeRef<'a>> {
        self.nodes.get(node_id).copied()
    }

    /// Node owning the given port.
    pub fn port_owner(&self, port_id: &str) -> Option<NodeRef<'a>> {
        self.port_owner
            .get(port_id)
            .and_then(|id| self.nodes.get(id))
            .copied()
    }

    /// Where the named port's first declared outgoing wire lands.
    pub fn resolve_outgoing(
        &self,
        node_id: &str,
        port_name: &str,
    ) -> Option<(NodeRef<'a>, &'a Port)> {
        let port = self.node(node_id)?.port_named(port_name)?;
        let idx = *self.indices.get(node_id)?;
        let wire = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().source_port_id == port.id)
            .min_by_key(|e| e.id().index())?
            .weight();
        self.endpoint(&wire.target_node_id, &wire.target_port_id)
    }

    /// Every wire arriving at the named port, in wire declaration order.
    pub fn resolve_incoming(
        &self,
        node_id: &str,
        port_name: &str,
    ) -> Vec<(NodeRef<'a>, &'a Port)> {
        let Some(port) = self.node(node_id).and_then(|n| n.port_named(port_name)) else {
            return Vec::new();
        };
        let Some(&idx) = self.indices.get(node_id) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().target_port_id == port.id)
            .collect();
        // petgraph walks adjacency newest-first
        edges.sort_by_key(|e| e.id().index());

        edges
            .into_iter()
            .filter_map(|e| {
                let w = e.weight();
                self.endpoint(&w.source_node_id, &w.source_port_id)
            })
            .collect()
    }

    fn endpoint(&self, node_id: &str, port_id: &str) -> Option<(NodeRef<'a>, &'a Port)> {
        Some((self.node(node_id)?, *self.ports.get(port_id)?))
    }

    /// Nearest Host ancestor of a node; a host is its own host.
    pub fn find_host_for(&self, node_id: &str) -> Option<&'a Container> {
        self.hosts.get(node_id).copied()
    }

    pub fn are_on_same_host(&self, a: &str, b: &str) -> bool {
        match (self.find_host_for(a), self.find_host_for(b)) {
            (Some(ha), Some(hb)) => ha.id == hb.id,
            _ => false,
        }
    }

    /// Images wired into any of this image's inbound ports, first wire first.
    pub fn consumers_of(&self, image_id: &str) -> Vec<&'a Image> {
        let Some(node) = self.node(image_id) else {
            return Vec::new();
        };

        let mut consumers: Vec<&'a Image> = Vec::new();
        for port in node.ports().iter().filter(|p| p.direction.accepts_incoming()) {
            for (peer, _) in self.resolve_incoming(image_id, &port.name) {
                if let Some(image) = peer.as_image() {
                    if !consumers.iter().any(|c| c.id == image.id) {
                        consumers.push(image);
                    }
                }
            }
        }
        consumers
    }

    /// Proxied images directly inside a reverse proxy, with their upstream path.
    pub fn resolve_caddy_upstreams(&self, proxy: &'a Container) -> Vec<(&'a Image, &'a str)> {
        if proxy.kind != ContainerKind::ReverseProxy {
            return Vec::new();
        }
        proxy
            .images
            .iter()
            .filter_map(|image| {
                let path = image.config.get(UPSTREAM_PATH_KEY)?.as_str()?;
                (!path.is_empty()).then_some((image, path))
            })
            .collect()
    }

    /// Order hosts so that hosts serving other hosts' images come first.
    ///
    /// Hosts with no dependency between them keep the given order. Falls
    /// back to the given order when host dependencies form a cycle.
    pub fn host_start_order(&self, host_ids: &[&'a str]) -> Vec<&'a str> {
        let mut graph: DiGraph<&'a str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for &id in host_ids {
            index.entry(id).or_insert_with(|| graph.add_node(id));
        }

        for edge in self.graph.edge_references() {
            let wire = edge.weight();
            let consumer = self.find_host_for(&wire.source_node_id);
            let provider = self.find_host_for(&wire.target_node_id);
            if let (Some(consumer), Some(provider)) = (consumer, provider) {
                if consumer.id == provider.id {
                    continue;
                }
                if let (Some(&from), Some(&to)) =
                    (index.get(provider.id.as_str()), index.get(consumer.id.as_str()))
                {
                    graph.update_edge(from, to, ());
                }
            }
        }

        let mut pending: Vec<usize> = graph
            .node_indices()
            .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();
        let mut order = Vec::with_capacity(pending.len());
        let mut done = vec![false; pending.len()];
        while order.len() < pending.len() {
            // Node indices follow declaration order, so the lowest ready index wins.
            let Some(next) = graph
                .node_indices()
                .find(|idx| !done[idx.index()] && pending[idx.index()] == 0)
            else {
                warn!("Circular host dependencies detected, keeping declaration order");
                return index_order(host_ids);
            };
            done[next.index()] = true;
            order.push(graph[next]);
            for dependent in graph.neighbors_directed(next, Direction::Outgoing) {
                pending[dependent.index()] -= 1;
            }
        }
        order
    }
}

fn index_order<'a>(host_ids: &[&'a str]) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for &id in host_ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use toposhift_topology::ImageKind;

    #[test]
    fn test_resolve_outgoing() {
        let topology = scenario_source();
        let resolver = WireResolver::new(&topology);

        let (node, port) = resolver.resolve_outgoing("hub", "out").unwrap();
        assert_eq!(node.id(), "db");
        assert_eq!(port.id, "db-in");
        assert!(resolver.resolve_outgoing("db", "out").is_none());
        assert!(resolver.resolve_outgoing("hub", "missing").is_none());
    }

    #[test]
    fn test_resolve_outgoing_takes_first_declared_wire() {
        let a = host(
            "h-1",
            vec![
                service("a", "app", ImageKind::AppServer),
                service("x", "primary", ImageKind::Database),
                service("y", "replica", ImageKind::Database),
            ],
        );
        let topology = topology("t", vec![a], vec![link("a", "x"), link("a", "y")]);
        let resolver = WireResolver::new(&topology);

        let (node, _) = resolver.resolve_outgoing("a", "out").unwrap();
        assert_eq!(node.id(), "x");
    }

    #[test]
    fn test_resolve_incoming_fan_in_in_wire_order() {
        let topology = scenario_source();
        let resolver = WireResolver::new(&topology);

        let incoming = resolver.resolve_incoming("db", "in");
        let ids: Vec<&str> = incoming.iter().map(|(n, _)| n.id()).collect();
        assert_eq!(ids, vec!["hub", "fed"]);

        let store: Vec<&str> = resolver
            .resolve_incoming("store", "in")
            .iter()
            .map(|(n, _)| n.id())
            .collect();
        assert_eq!(store, vec!["fed"]);
    }

    #[test]
    fn test_consumers_are_images_only() {
        let mut topology = scenario_source();
        topology.wires.push(toposhift_topology::Wire {
            id: "w-ctl".to_string(),
            source_node_id: "h-main".to_string(),
            source_port_id: "h-main-ctl".to_string(),
            target_node_id: "db".to_string(),
            target_port_id: "db-in".to_string(),
        });
        let resolver = WireResolver::new(&topology);

        let consumers: Vec<&str> = resolver
            .consumers_of("db")
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(consumers, vec!["hub", "fed"]);
        assert_eq!(resolver.port_owner("h-main-ctl").unwrap().id(), "h-main");
    }

    #[test]
    fn test_find_host_and_same_host() {
        let topology = scenario_target();
        let resolver = WireResolver::new(&topology);

        assert_eq!(resolver.find_host_for("hub").unwrap().id, "h-main");
        assert_eq!(resolver.find_host_for("fed-db").unwrap().id, "h-fed");
        assert_eq!(resolver.find_host_for("h-media").unwrap().id, "h-media");
        assert!(resolver.find_host_for("fg").is_none());

        assert!(resolver.are_on_same_host("fed-db", "fed-store"));
        assert!(!resolver.are_on_same_host("hub", "hub-db"));
        assert!(!resolver.are_on_same_host("fg", "fg"));
    }

    #[test]
    fn test_caddy_upstreams() {
        let topology = scenario_target();
        let resolver = WireResolver::new(&topology);
        let proxy = &topology.containers[0].children[0];

        let upstreams: Vec<(&str, &str)> = resolver
            .resolve_caddy_upstreams(proxy)
            .into_iter()
            .map(|(i, p)| (i.id.as_str(), p))
            .collect();
        assert_eq!(upstreams, vec![("hub", "/"), ("fed", "/federation")]);

        let host = &topology.containers[0];
        assert!(resolver.resolve_caddy_upstreams(host).is_empty());
    }

    #[test]
    fn test_host_start_order_puts_providers_first() {
        let app = host("h-app", vec![service("app", "app", ImageKind::AppServer)]);
        let data = host("h-data", vec![service("pg", "postgres", ImageKind::Database)]);
        let topology = topology("t", vec![app, data], vec![link("app", "pg")]);
        let resolver = WireResolver::new(&topology);

        let order = resolver.host_start_order(&["h-app", "h-data"]);
        assert_eq!(order, vec!["h-data", "h-app"]);
    }

    #[test]
    fn test_host_start_order_keeps_independent_hosts_in_order() {
        let a = host("h-a", vec![service("a", "a", ImageKind::Custom)]);
        let b = host("h-b", vec![service("b", "b", ImageKind::Custom)]);
        let c = host("h-c", vec![service("c", "c", ImageKind::Database)]);
        let topology = topology("t", vec![a, b, c], vec![link("b", "c")]);
        let resolver = WireResolver::new(&topology);

        assert_eq!(resolver.host_start_order(&["h-a", "h-b"]), vec!["h-a", "h-b"]);
        assert_eq!(
            resolver.host_start_order(&["h-a", "h-b", "h-c"]),
            vec!["h-a", "h-c", "h-b"]
        );
    }

    #[test]
    fn test_host_start_order_cycle_keeps_input_order() {
        let a = host("h-a", vec![service("a", "a", ImageKind::Custom)]);
        let b = host("h-b", vec![service("b", "b", ImageKind::Custom)]);
        let topology = topology("t", vec![a, b], vec![link("a", "b"), link("b", "a")]);
        let resolver = WireResolver::new(&topology);

        assert_eq!(resolver.host_start_order(&["h-a", "h-b", "h-a"]), vec!["h-a", "h-b"]);
    }
}

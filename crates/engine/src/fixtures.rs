//! Topology builders shared by engine tests.

use toposhift_topology::{
    ConfigMap, Container, ContainerKind, Image, ImageKind, Port, PortDirection, PortType,
    Topology, Wire,
};

pub fn port(id: &str, name: &str, direction: PortDirection) -> Port {
    Port {
        id: id.to_string(),
        name: name.to_string(),
        port_type: PortType::Network,
        direction,
    }
}

/// Image with an `in` port (`<id>-in`) and an `out` port (`<id>-out`).
pub fn service(id: &str, name: &str, kind: ImageKind) -> Image {
    Image {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        ports: vec![
            port(&format!("{}-in", id), "in", PortDirection::In),
            port(&format!("{}-out", id), "out", PortDirection::Out),
        ],
        config: ConfigMap::new(),
    }
}

pub fn with_config(mut image: Image, entries: &[(&str, serde_json::Value)]) -> Image {
    for (key, value) in entries {
        image.config.insert(key.to_string(), value.clone());
    }
    image
}

pub fn container(
    id: &str,
    kind: ContainerKind,
    images: Vec<Image>,
    children: Vec<Container>,
) -> Container {
    Container {
        id: id.to_string(),
        name: id.trim_start_matches("h-").to_string(),
        kind,
        geometry: None,
        ports: vec![port(&format!("{}-ctl", id), "control", PortDirection::InOut)],
        images,
        children,
        config: ConfigMap::new(),
    }
}

pub fn host(id: &str, images: Vec<Image>) -> Container {
    container(id, ContainerKind::Host, images, vec![])
}

/// Wire from `from`'s out port into `to`'s in port.
pub fn link(from: &str, to: &str) -> Wire {
    Wire {
        id: format!("w-{}-{}", from, to),
        source_node_id: from.to_string(),
        source_port_id: format!("{}-out", from),
        target_node_id: to.to_string(),
        target_port_id: format!("{}-in", to),
    }
}

pub fn topology(id: &str, containers: Vec<Container>, wires: Vec<Wire>) -> Topology {
    Topology {
        id: id.to_string(),
        name: id.to_string(),
        containers,
        wires,
    }
}

fn proxied(id: &str, name: &str, kind: ImageKind, path: &str) -> Image {
    with_config(service(id, name, kind), &[("upstreamPath", serde_json::json!(path))])
}

/// One host running everything: postgres, redis, minio, and the hub and
/// federation servers behind a reverse proxy.
pub fn scenario_source() -> Topology {
    let proxy = container(
        "proxy",
        ContainerKind::ReverseProxy,
        vec![
            proxied("hub", "hub", ImageKind::HubServer, "/"),
            proxied("fed", "federation", ImageKind::FederationServer, "/federation"),
        ],
        vec![],
    );
    let main = container(
        "h-main",
        ContainerKind::Host,
        vec![
            service("db", "postgres", ImageKind::Database),
            service("cache", "redis", ImageKind::Cache),
            service("store", "minio", ImageKind::ObjectStore),
        ],
        vec![proxy],
    );
    topology(
        "source",
        vec![main],
        vec![
            link("hub", "db"),
            link("hub", "cache"),
            link("fed", "db"),
            link("fed", "cache"),
            link("fed", "store"),
        ],
    )
}

/// Hub data moves to a dedicated host, federation data moves under a
/// federation group, and a media host is added.
pub fn scenario_target() -> Topology {
    let proxy = container(
        "proxy",
        ContainerKind::ReverseProxy,
        vec![
            proxied("hub", "hub", ImageKind::HubServer, "/"),
            proxied("fed", "federation", ImageKind::FederationServer, "/federation"),
        ],
        vec![],
    );
    let main = container("h-main", ContainerKind::Host, vec![], vec![proxy]);
    let hub_data = host(
        "h-hubdata",
        vec![
            with_config(
                service("hub-db", "postgres", ImageKind::Database),
                &[("POSTGRES_PASSWORD", serde_json::json!("$HUB_DB_PASSWORD"))],
            ),
            service("hub-cache", "redis", ImageKind::Cache),
        ],
    );
    let federation = container(
        "fg",
        ContainerKind::FederationGroup,
        vec![],
        vec![host(
            "h-fed",
            vec![
                service("fed-db", "postgres", ImageKind::Database),
                service("fed-cache", "redis", ImageKind::Cache),
                service("fed-store", "minio", ImageKind::ObjectStore),
            ],
        )],
    );
    let media = host(
        "h-media",
        vec![service("media", "jellyfin", ImageKind::MediaServer)],
    );
    topology(
        "target",
        vec![main, hub_data, federation, media],
        vec![
            link("hub", "hub-db"),
            link("hub", "hub-cache"),
            link("fed", "fed-db"),
            link("fed", "fed-cache"),
            link("fed", "fed-store"),
        ],
    )
}

//! Flatten a topology tree into hosted leaf images.

use toposhift_topology::{Container, ContainerKind, Image, Topology};

/// An image together with the containers that decide how it is migrated.
#[derive(Debug, Clone)]
pub struct FlatImage<'a> {
    pub image: &'a Image,
    /// Nearest enclosing Host.
    pub host: &'a Container,
    /// Nearest enclosing FederationGroup, if any.
    pub federation_group: Option<&'a Container>,
    /// Human-readable location, e.g. `main / proxy / hub`.
    pub path: String,
}

impl<'a> FlatImage<'a> {
    pub fn is_federated(&self) -> bool {
        self.federation_group.is_some()
    }
}

/// Ancestor state threaded down the tree by value.
#[derive(Clone, Default)]
struct Ancestry<'a> {
    host: Option<&'a Container>,
    federation_group: Option<&'a Container>,
    path: Vec<&'a str>,
}

impl<'a> Ancestry<'a> {
    fn enter(&self, container: &'a Container) -> Self {
        let mut next = self.clone();
        match container.kind {
            ContainerKind::Host => next.host = Some(container),
            ContainerKind::FederationGroup => next.federation_group = Some(container),
            ContainerKind::Network | ContainerKind::ReverseProxy => {}
        }
        next.path.push(&container.name);
        next
    }
}

/// Flatten every hosted image in the topology.
///
/// Images with no Host ancestor cannot be provisioned and are dropped.
pub fn flatten_images(topology: &Topology) -> Vec<FlatImage<'_>> {
    topology
        .containers
        .iter()
        .flat_map(|c| visit(c, Ancestry::default()))
        .collect()
}

fn visit<'a>(container: &'a Container, parent: Ancestry<'a>) -> Vec<FlatImage<'a>> {
    let ancestry = parent.enter(container);
    let mut out = Vec::new();

    if let Some(host) = ancestry.host {
        for image in &container.images {
            let mut path = ancestry.path.clone();
            path.push(&image.name);
            out.push(FlatImage {
                image,
                host,
                federation_group: ancestry.federation_group,
                path: path.join(" / "),
            });
        }
    }

    for child in &container.children {
        out.extend(visit(child, ancestry.clone()));
    }
    out
}

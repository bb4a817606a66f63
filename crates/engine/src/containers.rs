//! Host-level outcomes derived from image matches.

use std::collections::{HashMap, HashSet};
use toposhift_topology::{
    ContainerMatch, ContainerMatchKind, HostRef, ImageMatch, Topology,
};
use tracing::debug;

/// Derive host matches purely from which hosts the matched images moved between.
///
/// Hosts are never compared directly: a source host pairs with every target
/// host that received one of its images.
pub fn derive_container_matches(
    source: &Topology,
    target: &Topology,
    image_matches: &[ImageMatch],
) -> Vec<ContainerMatch> {
    // source host -> target hosts, first seen first
    let mut forward: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut reverse: HashSet<&str> = HashSet::new();
    let mut justifying: HashMap<(&str, &str), Vec<String>> = HashMap::new();
    let mut names: HashMap<&str, &str> = HashMap::new();

    for m in image_matches {
        let (Some(s), Some(t)) = (&m.source, &m.target) else {
            continue;
        };
        let (sh, th) = (s.host_id.as_str(), t.host_id.as_str());
        names.insert(sh, &s.host_name);
        names.insert(th, &t.host_name);

        let targets = forward.entry(sh).or_default();
        if !targets.contains(&th) {
            targets.push(th);
        }
        reverse.insert(th);
        justifying
            .entry((sh, th))
            .or_default()
            .push(t.image_id.clone());
    }

    let host_ref = |id: &str, fallback: &str| HostRef {
        host_id: id.to_string(),
        host_name: names.get(id).copied().unwrap_or(fallback).to_string(),
    };

    let mut matches = Vec::new();
    for host in source.hosts() {
        let Some(targets) = forward.get(host.id.as_str()) else {
            matches.push(ContainerMatch {
                source: Some(host_ref(&host.id, &host.name)),
                target: None,
                kind: ContainerMatchKind::Removed,
                matched_image_ids: Vec::new(),
            });
            continue;
        };

        let kind = if targets.len() > 1 {
            ContainerMatchKind::SplitHost
        } else {
            ContainerMatchKind::Matched
        };
        for &th in targets {
            matches.push(ContainerMatch {
                source: Some(host_ref(&host.id, &host.name)),
                target: Some(host_ref(th, th)),
                kind,
                matched_image_ids: justifying
                    .get(&(host.id.as_str(), th))
                    .cloned()
                    .unwrap_or_default(),
            });
        }
    }

    for host in target.hosts() {
        if !reverse.contains(host.id.as_str()) {
            matches.push(ContainerMatch {
                source: None,
                target: Some(host_ref(&host.id, &host.name)),
                kind: ContainerMatchKind::Added,
                matched_image_ids: Vec::new(),
            });
        }
    }

    debug!("Derived {} host matches", matches.len());
    matches
}

//! Image-level matching between source and target topologies.

use crate::flatten::FlatImage;
use crate::wires::WireResolver;
use std::collections::BTreeMap;
use toposhift_topology::{ImageKind, ImageMatch, ImageMatchKind, ImageRef};
use tracing::debug;

/// Match every hosted image in the source against the target.
///
/// Images are grouped by kind; each group is resolved independently.
/// Every source and every target image ends up in at least one match.
pub fn match_images(
    source: &[FlatImage<'_>],
    target: &[FlatImage<'_>],
    source_wires: &WireResolver<'_>,
    target_wires: &WireResolver<'_>,
) -> Vec<ImageMatch> {
    let mut groups: BTreeMap<ImageKind, (Vec<&FlatImage<'_>>, Vec<&FlatImage<'_>>)> =
        BTreeMap::new();
    for flat in source {
        groups.entry(flat.image.kind).or_default().0.push(flat);
    }
    for flat in target {
        groups.entry(flat.image.kind).or_default().1.push(flat);
    }

    let mut matches = Vec::new();
    for (kind, (sources, targets)) in groups {
        debug!(
            "Matching {} images: {} source, {} target",
            kind,
            sources.len(),
            targets.len()
        );

        match (sources.len(), targets.len()) {
            (0, _) => matches.extend(targets.iter().map(|t| added(t))),
            (_, 0) => matches.extend(sources.iter().map(|s| removed(s))),
            (1, 1) => {
                let (s, t) = (sources[0], targets[0]);
                matches.push(paired(s, t, classify(s, t), None));
            }
            (1, _) => matches.extend(match_split(
                sources[0],
                &targets,
                source_wires,
                target_wires,
            )),
            _ => matches.extend(match_by_name(sources, targets)),
        }
    }

    matches
}

/// Classify a one-to-one pair.
fn classify(source: &FlatImage<'_>, target: &FlatImage<'_>) -> ImageMatchKind {
    if source.host.id != target.host.id {
        ImageMatchKind::Relocated
    } else if source.image.config.len() != target.image.config.len()
        || source
            .image
            .config
            .iter()
            .any(|(k, v)| target.image.config.get(k) != Some(v))
    {
        ImageMatchKind::Modified
    } else {
        ImageMatchKind::Unchanged
    }
}

/// Resolve one source fanning out to several targets.
///
/// Each consumer of the source claims the first unclaimed target that has a
/// consumer of the same kind. Targets left over are still splits of the
/// source, just without a disambiguating consumer.
fn match_split(
    source: &FlatImage<'_>,
    targets: &[&FlatImage<'_>],
    source_wires: &WireResolver<'_>,
    target_wires: &WireResolver<'_>,
) -> Vec<ImageMatch> {
    let mut remaining: Vec<&FlatImage<'_>> = targets.to_vec();
    let mut matches = Vec::with_capacity(targets.len());

    for consumer in source_wires.consumers_of(&source.image.id) {
        let claimed = remaining.iter().position(|t| {
            target_wires
                .consumers_of(&t.image.id)
                .iter()
                .any(|c| c.kind == consumer.kind)
        });
        if let Some(pos) = claimed {
            let target = remaining.remove(pos);
            debug!(
                "Split {} -> {} via consumer {}",
                source.image.id, target.image.id, consumer.id
            );
            matches.push(paired(
                source,
                target,
                ImageMatchKind::Split,
                Some(consumer.id.clone()),
            ));
        }
    }

    for target in remaining {
        matches.push(paired(source, target, ImageMatchKind::Split, None));
    }
    matches
}

/// Pair images with identical names, then report everything else as
/// removed or added. Among equally named targets, one with the same id wins.
fn match_by_name<'s, 'a>(
    mut sources: Vec<&'s FlatImage<'a>>,
    mut targets: Vec<&'s FlatImage<'a>>,
) -> Vec<ImageMatch> {
    let mut matches = Vec::new();

    for i in (0..sources.len()).rev() {
        let source = sources[i];
        let found = targets
            .iter()
            .position(|t| t.image.id == source.image.id && t.image.name == source.image.name)
            .or_else(|| targets.iter().position(|t| t.image.name == source.image.name));
        if let Some(j) = found {
            sources.remove(i);
            let target = targets.remove(j);
            matches.push(paired(source, target, classify(source, target), None));
        }
    }

    matches.extend(sources.iter().map(|s| removed(s)));
    matches.extend(targets.iter().map(|t| added(t)));
    matches
}

fn image_ref(flat: &FlatImage<'_>) -> ImageRef {
    ImageRef {
        image_id: flat.image.id.clone(),
        image_name: flat.image.name.clone(),
        image_kind: flat.image.kind,
        host_id: flat.host.id.clone(),
        host_name: flat.host.name.clone(),
    }
}

fn paired(
    source: &FlatImage<'_>,
    target: &FlatImage<'_>,
    kind: ImageMatchKind,
    split_consumer_id: Option<String>,
) -> ImageMatch {
    ImageMatch {
        source: Some(image_ref(source)),
        target: Some(image_ref(target)),
        kind,
        split_consumer_id,
        target_is_federation: target.is_federated(),
    }
}

fn added(target: &FlatImage<'_>) -> ImageMatch {
    ImageMatch {
        source: None,
        target: Some(image_ref(target)),
        kind: ImageMatchKind::Added,
        split_consumer_id: None,
        target_is_federation: target.is_federated(),
    }
}

fn removed(source: &FlatImage<'_>) -> ImageMatch {
    ImageMatch {
        source: Some(image_ref(source)),
        target: None,
        kind: ImageMatchKind::Removed,
        split_consumer_id: None,
        target_is_federation: false,
    }
}

//! Toposhift engine - diff two topologies and plan the migration between them.
//!
//! Every operation here is a pure function of its inputs. Indices such as
//! [`WireResolver`] are built per call and dropped with it.

pub mod answers;
pub mod containers;
pub mod decisions;
pub mod flatten;
pub mod images;
pub mod patterns;
pub mod planner;
pub mod runbook;
pub mod wires;

#[cfg(test)]
mod fixtures;

pub use answers::{apply_answers, unanswered_required};
pub use containers::derive_container_matches;
pub use decisions::generate_decisions;
pub use flatten::{flatten_images, FlatImage};
pub use images::match_images;
pub use planner::generate_plan;
pub use runbook::render_runbook;
pub use wires::{NodeRef, WireResolver};

use toposhift_topology::{DiffCounts, MigrationDiffResult, Topology};
use tracing::info;

/// Run the full match pipeline and collect the result.
pub fn compute_diff(source: &Topology, target: &Topology) -> MigrationDiffResult {
    // Step 1: Flatten both trees into hosted images
    let source_flat = flatten_images(source);
    let target_flat = flatten_images(target);

    // Step 2: Index wires
    let source_wires = WireResolver::new(source);
    let target_wires = WireResolver::new(target);

    // Step 3: Match images, then derive hosts from them
    let image_matches = match_images(&source_flat, &target_flat, &source_wires, &target_wires);
    let container_matches = derive_container_matches(source, target, &image_matches);

    // Step 4: Decisions
    let decisions = generate_decisions(&image_matches, &target_flat);

    let counts = DiffCounts::tally(&image_matches, &container_matches);
    let summary = counts.summary();
    info!("{} -> {}: {}", source.name, target.name, summary);

    MigrationDiffResult {
        source_topology_id: source.id.clone(),
        target_topology_id: target.id.clone(),
        summary,
        counts,
        image_matches,
        container_matches,
        decisions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use pretty_assertions::assert_eq;
    use toposhift_topology::ImageMatchKind;

    #[test]
    fn test_self_diff_is_empty() {
        let topology = scenario_target();
        let diff = compute_diff(&topology, &topology);

        assert!(diff.counts.is_empty());
        assert_eq!(diff.counts.images_unchanged, 8);
        assert_eq!(diff.counts.hosts_added, 0);
        assert_eq!(diff.counts.hosts_removed, 0);
        assert_eq!(diff.summary, "No changes between source and target topologies");
        let ids: Vec<&str> = diff.decisions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["variable:HUB_DB_PASSWORD"]);
    }

    #[test]
    fn test_scenario_diff() {
        let diff = compute_diff(&scenario_source(), &scenario_target());

        assert_eq!(diff.source_topology_id, "source");
        assert_eq!(diff.target_topology_id, "target");
        assert_eq!(
            diff.counts,
            DiffCounts {
                hosts_added: 1,
                hosts_removed: 0,
                hosts_split: 1,
                images_added: 1,
                images_removed: 0,
                images_relocated: 1,
                images_split: 2,
                images_modified: 0,
                images_unchanged: 2,
            }
        );

        let db_splits: Vec<bool> = diff
            .image_matches
            .iter()
            .filter(|m| m.kind == ImageMatchKind::Split)
            .filter(|m| m.source.as_ref().is_some_and(|s| s.image_id == "db"))
            .map(|m| m.target_is_federation)
            .collect();
        assert_eq!(db_splits, vec![false, true]);

        let media = diff
            .image_matches
            .iter()
            .find(|m| m.target.as_ref().is_some_and(|t| t.image_id == "media"))
            .unwrap();
        assert_eq!(media.kind, ImageMatchKind::Added);

        for id in ["hub-database-migration", "secret-handling"] {
            let decision = diff.decisions.iter().find(|d| d.id == id).unwrap();
            assert!(decision.required);
        }
    }

    #[test]
    fn test_diff_serializes_camel_case() {
        let diff = compute_diff(&scenario_source(), &scenario_target());
        let value = serde_json::to_value(&diff).unwrap();

        assert_eq!(value["sourceTopologyId"], "source");
        assert_eq!(value["counts"]["imagesSplit"], 2);
        assert_eq!(value["imageMatches"][0]["kind"], "split");
        assert_eq!(value["imageMatches"][0]["splitConsumerId"], "hub");
        assert_eq!(value["containerMatches"][0]["kind"], "split-host");
    }
}

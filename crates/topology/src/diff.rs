//! Diff result types - output of the matcher.

use crate::plan::MigrationDecision;
use crate::topology::ImageKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a source image relates to a target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageMatchKind {
    Unchanged,
    Modified,
    Relocated,
    Split,
    Added,
    Removed,
}

/// One side of an image match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub image_id: String,
    pub image_name: String,
    pub image_kind: ImageKind,
    pub host_id: String,
    pub host_name: String,
}

/// Correspondence between a source image and a target image.
///
/// Every source and every target image appears in the match set; a
/// missing side means the image was added or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMatch {
    pub source: Option<ImageRef>,
    pub target: Option<ImageRef>,
    pub kind: ImageMatchKind,
    /// Consumer image that disambiguated a split, if any.
    pub split_consumer_id: Option<String>,
    /// Target sits inside a federation group and is always freshly provisioned.
    pub target_is_federation: bool,
}

impl ImageMatch {
    /// Semantic kind of the matched image, from whichever side is present.
    pub fn image_kind(&self) -> Option<ImageKind> {
        self.source
            .as_ref()
            .or(self.target.as_ref())
            .map(|r| r.image_kind)
    }

    /// Both sides exist and live on different hosts.
    pub fn changes_host(&self) -> bool {
        match (&self.source, &self.target) {
            (Some(s), Some(t)) => s.host_id != t.host_id,
            _ => false,
        }
    }
}

/// How a source host relates to target hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerMatchKind {
    Matched,
    Added,
    Removed,
    SplitHost,
}

/// One side of a host match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRef {
    pub host_id: String,
    pub host_name: String,
}

/// Host-level outcome derived from image matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMatch {
    pub source: Option<HostRef>,
    pub target: Option<HostRef>,
    pub kind: ContainerMatchKind,
    /// Target image ids whose matches justified this pairing.
    pub matched_image_ids: Vec<String>,
}

/// Aggregate counts over a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffCounts {
    pub hosts_added: usize,
    pub hosts_removed: usize,
    pub hosts_split: usize,
    pub images_added: usize,
    pub images_removed: usize,
    pub images_relocated: usize,
    /// Distinct source images that fan out to several targets.
    pub images_split: usize,
    pub images_modified: usize,
    pub images_unchanged: usize,
}

impl DiffCounts {
    /// Tally counts from completed match lists.
    pub fn tally(image_matches: &[ImageMatch], container_matches: &[ContainerMatch]) -> Self {
        let mut counts = DiffCounts::default();
        let mut split_sources = BTreeSet::new();
        let mut split_hosts = BTreeSet::new();

        for m in image_matches {
            match m.kind {
                ImageMatchKind::Added => counts.images_added += 1,
                ImageMatchKind::Removed => counts.images_removed += 1,
                ImageMatchKind::Relocated => counts.images_relocated += 1,
                ImageMatchKind::Modified => counts.images_modified += 1,
                ImageMatchKind::Unchanged => counts.images_unchanged += 1,
                ImageMatchKind::Split => {
                    if let Some(ref s) = m.source {
                        split_sources.insert(s.image_id.as_str());
                    }
                }
            }
        }

        for c in container_matches {
            match c.kind {
                ContainerMatchKind::Added => counts.hosts_added += 1,
                ContainerMatchKind::Removed => counts.hosts_removed += 1,
                ContainerMatchKind::SplitHost => {
                    if let Some(ref s) = c.source {
                        split_hosts.insert(s.host_id.as_str());
                    }
                }
                ContainerMatchKind::Matched => {}
            }
        }

        counts.images_split = split_sources.len();
        counts.hosts_split = split_hosts.len();
        counts
    }

    /// Check if nothing changed at all.
    pub fn is_empty(&self) -> bool {
        self.hosts_added == 0
            && self.hosts_removed == 0
            && self.hosts_split == 0
            && self.images_added == 0
            && self.images_removed == 0
            && self.images_relocated == 0
            && self.images_split == 0
            && self.images_modified == 0
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No changes between source and target topologies".to_string();
        }
        format!(
            "Hosts: {} added, {} removed, {} split. Images: {} added, {} removed, {} relocated, {} split, {} modified, {} unchanged",
            self.hosts_added,
            self.hosts_removed,
            self.hosts_split,
            self.images_added,
            self.images_removed,
            self.images_relocated,
            self.images_split,
            self.images_modified,
            self.images_unchanged,
        )
    }
}

/// The complete diff between two topologies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationDiffResult {
    pub source_topology_id: String,
    pub target_topology_id: String,
    pub summary: String,
    pub counts: DiffCounts,
    pub image_matches: Vec<ImageMatch>,
    pub container_matches: Vec<ContainerMatch>,
    pub decisions: Vec<MigrationDecision>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_ref(image_id: &str, kind: ImageKind, host_id: &str) -> ImageRef {
        ImageRef {
            image_id: image_id.to_string(),
            image_name: image_id.to_string(),
            image_kind: kind,
            host_id: host_id.to_string(),
            host_name: host_id.to_string(),
        }
    }

    fn image_match(
        source: Option<ImageRef>,
        target: Option<ImageRef>,
        kind: ImageMatchKind,
    ) -> ImageMatch {
        ImageMatch {
            source,
            target,
            kind,
            split_consumer_id: None,
            target_is_federation: false,
        }
    }

    #[test]
    fn test_tally_counts_split_sources_once() {
        let db = image_ref("db", ImageKind::Database, "h1");
        let matches = vec![
            image_match(
                Some(db.clone()),
                Some(image_ref("db-a", ImageKind::Database, "h2")),
                ImageMatchKind::Split,
            ),
            image_match(
                Some(db),
                Some(image_ref("db-b", ImageKind::Database, "h3")),
                ImageMatchKind::Split,
            ),
            image_match(
                None,
                Some(image_ref("media", ImageKind::MediaServer, "h4")),
                ImageMatchKind::Added,
            ),
        ];

        let counts = DiffCounts::tally(&matches, &[]);
        assert_eq!(counts.images_split, 1);
        assert_eq!(counts.images_added, 1);
        assert!(!counts.is_empty());
    }

    #[test]
    fn test_empty_summary() {
        let counts = DiffCounts::tally(&[], &[]);
        assert!(counts.is_empty());
        assert_eq!(
            counts.summary(),
            "No changes between source and target topologies"
        );
    }

    #[test]
    fn test_changes_host() {
        let m = image_match(
            Some(image_ref("app", ImageKind::HubServer, "h1")),
            Some(image_ref("app", ImageKind::HubServer, "h2")),
            ImageMatchKind::Relocated,
        );
        assert!(m.changes_host());
        assert_eq!(m.image_kind(), Some(ImageKind::HubServer));

        let added = image_match(
            None,
            Some(image_ref("app", ImageKind::HubServer, "h2")),
            ImageMatchKind::Added,
        );
        assert!(!added.changes_host());
    }
}

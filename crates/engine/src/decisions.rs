//! Decision generation from detected migration risks.

use crate::flatten::FlatImage;
use crate::patterns::{sensitive_keys, variable_name};
use std::collections::{BTreeSet, HashMap};
use toposhift_topology::{
    ConfigMap, DecisionKind, DecisionOption, ImageKind, ImageMatch, ImageMatchKind,
    MigrationDecision,
};
use tracing::debug;

pub const HUB_DATABASE_MIGRATION: &str = "hub-database-migration";
pub const HUB_CACHE_MIGRATION: &str = "hub-cache-migration";
pub const SECRET_HANDLING: &str = "secret-handling";
pub const DNS_CUTOVER: &str = "dns-cutover";
pub const DOWNTIME_TOLERANCE: &str = "downtime-tolerance";
/// Prefix of per-variable decision ids, followed by the variable name.
pub const VARIABLE_PREFIX: &str = "variable:";

/// Id of the decision asking for a variable's value.
pub fn variable_decision_id(name: &str) -> String {
    format!("{}{}", VARIABLE_PREFIX, name)
}

/// Generate the decisions an operator must answer for this diff.
///
/// Rules are evaluated independently and emitted in a fixed order.
pub fn generate_decisions(
    image_matches: &[ImageMatch],
    target: &[FlatImage<'_>],
) -> Vec<MigrationDecision> {
    let mut decisions = Vec::new();

    let hub_db = hub_data_move(image_matches, ImageKind::Database);
    if let Some(m) = hub_db {
        decisions.push(hub_database_decision(m));
    }

    let hub_cache = hub_data_move(image_matches, ImageKind::Cache);
    if let Some(m) = hub_cache {
        decisions.push(hub_cache_decision(m));
    }

    let stateful: Vec<&ImageMatch> = stateful_moves(image_matches).collect();
    if !stateful.is_empty() {
        decisions.push(secret_decision(&stateful, target));
    }

    if let Some(m) = ingress_move(image_matches) {
        decisions.push(dns_decision(m));
    }

    if hub_db.is_some() || hub_cache.is_some() {
        decisions.push(downtime_decision());
    }

    for name in scan_variables(target) {
        decisions.push(MigrationDecision::new(
            variable_decision_id(&name),
            DecisionKind::VariableValue,
            format!("Value for ${}", name),
            format!(
                "The target configuration references ${} but does not define it",
                name
            ),
            true,
            Vec::new(),
        ));
    }

    for d in &decisions {
        debug!("Generated decision {} (required: {})", d.id, d.required);
    }
    decisions
}

fn is_moving(m: &ImageMatch) -> bool {
    matches!(m.kind, ImageMatchKind::Relocated | ImageMatchKind::Split)
}

/// First relocation or split of a non-federation image of the given kind.
pub(crate) fn hub_data_move(
    image_matches: &[ImageMatch],
    kind: ImageKind,
) -> Option<&ImageMatch> {
    image_matches
        .iter()
        .find(|m| is_moving(m) && !m.target_is_federation && m.image_kind() == Some(kind))
}

/// Relocations and splits of stateful images, federation targets included.
pub(crate) fn stateful_moves(
    image_matches: &[ImageMatch],
) -> impl Iterator<Item = &ImageMatch> {
    image_matches
        .iter()
        .filter(|m| is_moving(m) && m.image_kind().is_some_and(|k| k.is_stateful()))
}

/// First ingress image that changes host.
pub(crate) fn ingress_move(image_matches: &[ImageMatch]) -> Option<&ImageMatch> {
    image_matches
        .iter()
        .find(|m| m.changes_host() && m.image_kind().is_some_and(|k| k.is_ingress()))
}

fn movement(m: &ImageMatch) -> String {
    match (&m.source, &m.target) {
        (Some(s), Some(t)) => format!(
            "{} moves from host {} to host {}",
            s.image_name, s.host_name, t.host_name
        ),
        _ => "Data moves between hosts".to_string(),
    }
}

fn hub_database_decision(m: &ImageMatch) -> MigrationDecision {
    MigrationDecision::new(
        HUB_DATABASE_MIGRATION,
        DecisionKind::HubDatabaseMigration,
        "Hub database migration",
        format!("{}. Choose how its data is carried over.", movement(m)),
        true,
        vec![
            DecisionOption::new(
                "dump-restore",
                "Dump and restore",
                "Stop writes, dump the database and restore it on the new host. Brief downtime.",
            ),
            DecisionOption::new(
                "streaming-replication",
                "Streaming replication",
                "Replicate to the new host and promote it. Near-zero downtime.",
            ),
            DecisionOption::new(
                "fresh",
                "Start fresh",
                "Start with an empty database. Existing data is lost.",
            ),
        ],
    )
}

fn hub_cache_decision(m: &ImageMatch) -> MigrationDecision {
    MigrationDecision::new(
        HUB_CACHE_MIGRATION,
        DecisionKind::HubCacheMigration,
        "Hub cache migration",
        format!("{}. Cached data can be transferred or rebuilt.", movement(m)),
        false,
        vec![
            DecisionOption::new(
                "snapshot",
                "Transfer snapshot",
                "Copy a cache snapshot to the new host before starting it.",
            ),
            DecisionOption::new(
                "fresh",
                "Fresh instance",
                "Start an empty cache and let it warm up.",
            ),
        ],
    )
}

fn secret_decision(stateful: &[&ImageMatch], target: &[FlatImage<'_>]) -> MigrationDecision {
    let configs: HashMap<&str, &ConfigMap> = target
        .iter()
        .map(|f| (f.image.id.as_str(), &f.image.config))
        .collect();

    let mut names = BTreeSet::new();
    let mut keys = BTreeSet::new();
    for m in stateful {
        if let Some(ref t) = m.target {
            names.insert(t.image_name.as_str());
            if let Some(config) = configs.get(t.image_id.as_str()) {
                keys.extend(sensitive_keys(config));
            }
        }
    }

    let mut description = format!(
        "Stateful services change host: {}.",
        names.into_iter().collect::<Vec<_>>().join(", ")
    );
    if !keys.is_empty() {
        description.push_str(&format!(
            " Sensitive settings involved: {}.",
            keys.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    MigrationDecision::new(
        SECRET_HANDLING,
        DecisionKind::SecretHandling,
        "Secret handling",
        description,
        true,
        vec![
            DecisionOption::new(
                "rotate",
                "Rotate secrets",
                "Generate new credentials on the target and update every consumer.",
            ),
            DecisionOption::new(
                "preserve",
                "Preserve secrets",
                "Copy the existing credentials to the target unchanged.",
            ),
        ],
    )
}

fn dns_decision(m: &ImageMatch) -> MigrationDecision {
    MigrationDecision::new(
        DNS_CUTOVER,
        DecisionKind::DnsCutover,
        "DNS cutover",
        format!("{}. Public DNS must follow it.", movement(m)),
        true,
        vec![
            DecisionOption::new(
                "pre-point",
                "Pre-point (blue-green)",
                "Lower TTLs and point DNS at the new host before cutover.",
            ),
            DecisionOption::new(
                "post-cutover",
                "Update after cutover",
                "Switch DNS once the new host is serving. Short outage while records propagate.",
            ),
            DecisionOption::new(
                "manual",
                "Manual",
                "The operator updates DNS outside of this plan.",
            ),
        ],
    )
}

fn downtime_decision() -> MigrationDecision {
    MigrationDecision::new(
        DOWNTIME_TOLERANCE,
        DecisionKind::DowntimeTolerance,
        "Downtime tolerance",
        "Data is migrated between hosts. Choose how much downtime is acceptable.",
        true,
        vec![
            DecisionOption::new(
                "maintenance-window",
                "Maintenance window",
                "Take services offline during a scheduled window.",
            ),
            DecisionOption::new(
                "rolling",
                "Rolling update",
                "Move services one at a time, keeping the rest online.",
            ),
            DecisionOption::new(
                "accept-outage",
                "Accept brief outage",
                "Migrate immediately and accept a short unplanned outage.",
            ),
        ],
    )
}

/// Distinct variable names referenced by target image and host configs, first seen first.
fn scan_variables(target: &[FlatImage<'_>]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut seen_hosts = BTreeSet::new();

    let mut collect = |config: &ConfigMap| {
        for value in config.values() {
            if let Some(name) = value.as_str().and_then(variable_name) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
    };

    for flat in target {
        collect(&flat.image.config);
        if seen_hosts.insert(flat.host.id.as_str()) {
            collect(&flat.host.config);
        }
    }
    names
}

//! Migration plan generation.
//!
//! A plan is six fixed phases filled from the diff and the answered
//! decisions. Decision-driven steps come from a static table keyed by
//! decision id and option key, so adding an option means adding a row.

use crate::decisions::{
    hub_data_move, ingress_move, stateful_moves, DNS_CUTOVER, HUB_CACHE_MIGRATION,
    HUB_DATABASE_MIGRATION, SECRET_HANDLING,
};
use crate::wires::WireResolver;
use std::collections::HashMap;
use toposhift_common::Timestamp;
use toposhift_topology::{
    ContainerMatchKind, ImageKind, ImageMatch, ImageMatchKind, MigrationDecision,
    MigrationDiffResult, MigrationPhase, MigrationPlan, MigrationStep, PhaseKind, StepKind,
    Topology,
};
use tracing::{debug, info};
use uuid::Uuid;

/// A step with `{source_host}` and `{target_host}` placeholders.
struct StepTemplate {
    kind: StepKind,
    description: &'static str,
    script: Option<&'static str>,
    causes_downtime: bool,
    estimated_duration: &'static str,
}

const fn template(
    kind: StepKind,
    description: &'static str,
    script: Option<&'static str>,
    causes_downtime: bool,
    estimated_duration: &'static str,
) -> StepTemplate {
    StepTemplate {
        kind,
        description,
        script,
        causes_downtime,
        estimated_duration,
    }
}

/// Steps emitted for each answered decision option.
static DECISION_STEPS: &[(&str, &str, &[StepTemplate])] = &[
    (
        HUB_DATABASE_MIGRATION,
        "dump-restore",
        &[
            template(
                StepKind::DatabaseDump,
                "Stop writes and dump the hub database on {source_host}",
                Some("ssh {source_host} 'docker exec postgres pg_dumpall -U postgres' > hub-db.sql"),
                true,
                "15m",
            ),
            template(
                StepKind::DatabaseRestore,
                "Restore the hub database dump on {target_host}",
                Some("ssh {target_host} 'docker exec -i postgres psql -U postgres' < hub-db.sql"),
                true,
                "20m",
            ),
        ],
    ),
    (
        HUB_DATABASE_MIGRATION,
        "streaming-replication",
        &[template(
            StepKind::DatabaseRestore,
            "Stream the hub database from {source_host} to a replica on {target_host}, then promote the replica",
            None,
            false,
            "2h",
        )],
    ),
    (
        HUB_DATABASE_MIGRATION,
        "fresh",
        &[template(
            StepKind::Manual,
            "WARNING: the hub database on {target_host} starts empty. Data on {source_host} is not migrated",
            None,
            false,
            "0m",
        )],
    ),
    (
        HUB_CACHE_MIGRATION,
        "snapshot",
        &[template(
            StepKind::CacheTransfer,
            "Copy a cache snapshot from {source_host} to {target_host}",
            Some("ssh {source_host} 'docker exec redis redis-cli SAVE' && scp {source_host}:/data/dump.rdb {target_host}:/data/dump.rdb"),
            false,
            "5m",
        )],
    ),
    (
        HUB_CACHE_MIGRATION,
        "fresh",
        &[template(
            StepKind::Manual,
            "The cache on {target_host} starts empty and warms up on demand",
            None,
            false,
            "0m",
        )],
    ),
    (
        SECRET_HANDLING,
        "rotate",
        &[
            template(
                StepKind::SecretGenerate,
                "Generate new credentials for the services on {target_host}",
                None,
                false,
                "5m",
            ),
            template(
                StepKind::Manual,
                "Update every consumer of the rotated credentials",
                None,
                false,
                "15m",
            ),
        ],
    ),
    (
        SECRET_HANDLING,
        "preserve",
        &[template(
            StepKind::SecretCopy,
            "Copy existing credentials from {source_host} to {target_host}",
            None,
            false,
            "5m",
        )],
    ),
    (
        DNS_CUTOVER,
        "pre-point",
        &[template(
            StepKind::DnsUpdate,
            "Lower DNS TTLs and point records at {target_host} ahead of cutover",
            None,
            false,
            "5m",
        )],
    ),
    (
        DNS_CUTOVER,
        "post-cutover",
        &[template(
            StepKind::DnsUpdate,
            "Point DNS records at {target_host} once it is serving",
            None,
            true,
            "15m",
        )],
    ),
    (
        DNS_CUTOVER,
        "manual",
        &[template(
            StepKind::Manual,
            "Update DNS records for {target_host} by hand",
            None,
            false,
            "0m",
        )],
    ),
];

/// Host names substituted into a template.
struct HostPair {
    source: String,
    target: String,
}

impl HostPair {
    fn of(m: Option<&ImageMatch>) -> Self {
        let m = m.and_then(|m| Some((m.source.as_ref()?, m.target.as_ref()?)));
        match m {
            Some((s, t)) => HostPair {
                source: s.host_name.clone(),
                target: t.host_name.clone(),
            },
            None => HostPair {
                source: "source".to_string(),
                target: "target".to_string(),
            },
        }
    }
}

impl StepTemplate {
    fn render(&self, hosts: &HostPair) -> MigrationStep {
        let fill = |text: &str| {
            text.replace("{source_host}", &hosts.source)
                .replace("{target_host}", &hosts.target)
        };
        MigrationStep {
            order: 0,
            kind: self.kind,
            description: fill(self.description),
            script: self.script.map(|s| fill(s)),
            causes_downtime: self.causes_downtime,
            estimated_duration: self.estimated_duration.to_string(),
        }
    }
}

fn step(
    kind: StepKind,
    description: impl Into<String>,
    script: Option<String>,
    causes_downtime: bool,
    estimated_duration: &str,
) -> MigrationStep {
    MigrationStep {
        order: 0,
        kind,
        description: description.into(),
        script,
        causes_downtime,
        estimated_duration: estimated_duration.to_string(),
    }
}

/// Push a value once, keeping first-seen order.
fn push_unique<'a>(list: &mut Vec<&'a str>, value: &'a str) {
    if !list.contains(&value) {
        list.push(value);
    }
}

struct PlanBuilder<'a> {
    source: &'a Topology,
    target: &'a Topology,
    diff: &'a MigrationDiffResult,
    decisions: &'a [MigrationDecision],
    target_wires: WireResolver<'a>,
}

impl<'a> PlanBuilder<'a> {
    fn steps_for(&self, phase: PhaseKind) -> Vec<MigrationStep> {
        match phase {
            PhaseKind::PreCheck => self.pre_check(),
            PhaseKind::Infrastructure => self.infrastructure(),
            PhaseKind::DataMigration => self.data_migration(),
            PhaseKind::Provisioning => self.provisioning(),
            PhaseKind::Cutover => self.cutover(),
            PhaseKind::Cleanup => self.cleanup(),
        }
    }

    fn matches(&self) -> &'a [ImageMatch] {
        &self.diff.image_matches
    }

    /// Table steps for the selected option of a decision; nothing if unanswered.
    fn decision_steps(&self, decision_id: &str, hosts: &HostPair) -> Vec<MigrationStep> {
        let Some(key) = self
            .decisions
            .iter()
            .find(|d| d.id == decision_id)
            .and_then(|d| d.selected_option_key.as_deref())
        else {
            return Vec::new();
        };

        match DECISION_STEPS
            .iter()
            .find(|(id, option, _)| *id == decision_id && *option == key)
        {
            Some((_, _, templates)) => templates.iter().map(|t| t.render(hosts)).collect(),
            None => {
                debug!("No steps for {} = {}", decision_id, key);
                Vec::new()
            }
        }
    }

    fn pre_check(&self) -> Vec<MigrationStep> {
        let ssh_checks: Vec<String> = self
            .source
            .hosts()
            .iter()
            .map(|h| format!("ssh {} true", h.name))
            .collect();

        vec![
            step(
                StepKind::Validate,
                format!(
                    "Verify every host of source topology '{}' is reachable",
                    self.source.name
                ),
                (!ssh_checks.is_empty()).then(|| ssh_checks.join("\n")),
                false,
                "5m",
            ),
            step(
                StepKind::Validate,
                format!(
                    "Verify target topology '{}' is complete: {} hosts, {} images",
                    self.target.name,
                    self.target.hosts().len(),
                    self.target.image_count()
                ),
                None,
                false,
                "2m",
            ),
        ]
    }

    fn infrastructure(&self) -> Vec<MigrationStep> {
        let mut steps = Vec::new();

        let mut added_hosts = Vec::new();
        for c in &self.diff.container_matches {
            if c.kind == ContainerMatchKind::Added {
                if let Some(ref t) = c.target {
                    push_unique(&mut added_hosts, &t.host_name);
                }
            }
        }
        if !added_hosts.is_empty() {
            steps.push(step(
                StepKind::TerraformApply,
                format!("Provision new hosts: {}", added_hosts.join(", ")),
                Some("terraform init && terraform apply".to_string()),
                false,
                "10m",
            ));
        }

        let mut volume_hosts = Vec::new();
        let mut volume_commands = Vec::new();
        for m in stateful_moves(self.matches()).filter(|m| !m.target_is_federation) {
            if let Some(ref t) = m.target {
                push_unique(&mut volume_hosts, &t.host_name);
                let command =
                    format!("ssh {} 'docker volume create {}-data'", t.host_name, t.image_name);
                if !volume_commands.contains(&command) {
                    volume_commands.push(command);
                }
            }
        }
        if !volume_hosts.is_empty() {
            steps.push(step(
                StepKind::VolumeCreate,
                format!(
                    "Create data volumes for relocated services on: {}",
                    volume_hosts.join(", ")
                ),
                Some(volume_commands.join("\n")),
                false,
                "5m",
            ));
        }

        let mut new_stateful = Vec::new();
        for m in self.matches() {
            if m.kind == ImageMatchKind::Added && m.image_kind().is_some_and(|k| k.is_stateful()) {
                if let Some(ref t) = m.target {
                    push_unique(&mut new_stateful, &t.image_name);
                }
            }
        }
        if !new_stateful.is_empty() {
            steps.push(step(
                StepKind::SecretGenerate,
                format!(
                    "Generate credentials for new services: {}",
                    new_stateful.join(", ")
                ),
                None,
                false,
                "2m",
            ));
        }

        steps
    }

    fn data_migration(&self) -> Vec<MigrationStep> {
        let matches = self.matches();
        let mut steps = Vec::new();

        steps.extend(self.decision_steps(
            HUB_DATABASE_MIGRATION,
            &HostPair::of(hub_data_move(matches, ImageKind::Database)),
        ));
        steps.extend(self.decision_steps(
            HUB_CACHE_MIGRATION,
            &HostPair::of(hub_data_move(matches, ImageKind::Cache)),
        ));
        steps.extend(
            self.decision_steps(SECRET_HANDLING, &HostPair::of(stateful_moves(matches).next())),
        );

        let mut federated = Vec::new();
        for m in matches.iter().filter(|m| m.target_is_federation) {
            if let Some(ref t) = m.target {
                push_unique(&mut federated, &t.image_name);
            }
        }
        if !federated.is_empty() {
            steps.push(step(
                StepKind::Manual,
                format!(
                    "No data migration for federated services ({}): they start fresh and are populated by the federation",
                    federated.join(", ")
                ),
                None,
                false,
                "0m",
            ));
        }

        steps
    }

    fn provisioning(&self) -> Vec<MigrationStep> {
        let mut steps = Vec::new();

        let mut install_hosts = Vec::new();
        for c in &self.diff.container_matches {
            if matches!(c.kind, ContainerMatchKind::Added | ContainerMatchKind::SplitHost) {
                if let Some(ref t) = c.target {
                    push_unique(&mut install_hosts, &t.host_name);
                }
            }
        }
        if !install_hosts.is_empty() {
            let script = install_hosts
                .iter()
                .map(|h| format!("ssh {} 'curl -fsSL https://get.docker.com | sh'", h))
                .collect::<Vec<_>>()
                .join("\n");
            steps.push(step(
                StepKind::DockerInstall,
                format!("Install Docker on: {}", install_hosts.join(", ")),
                Some(script),
                false,
                "10m",
            ));
        }

        // target host id -> images it gains
        let mut gained: HashMap<&str, Vec<&str>> = HashMap::new();
        for m in self.matches() {
            let gains = matches!(
                m.kind,
                ImageMatchKind::Added | ImageMatchKind::Relocated | ImageMatchKind::Split
            );
            if !gains || m.target_is_federation {
                continue;
            }
            if let Some(ref t) = m.target {
                if m.kind != ImageMatchKind::Added && !m.changes_host() {
                    continue;
                }
                push_unique(gained.entry(&t.host_id).or_default(), &t.image_name);
            }
        }

        let hosts: Vec<&'a str> = self
            .target
            .hosts()
            .into_iter()
            .filter(|h| gained.contains_key(h.id.as_str()))
            .map(|h| h.id.as_str())
            .collect();
        for host_id in self.target_wires.host_start_order(&hosts) {
            let Some(host) = self.target_wires.find_host_for(host_id) else {
                continue;
            };
            let images = gained.get(host_id).map(|v| v.join(", ")).unwrap_or_default();
            steps.push(step(
                StepKind::DockerRun,
                format!("Start {} on {}", images, host.name),
                Some(format!("ssh {} 'docker compose up -d'", host.name)),
                false,
                "5m",
            ));
        }

        steps
    }

    fn cutover(&self) -> Vec<MigrationStep> {
        let matches = self.matches();
        let mut steps = self.decision_steps(DNS_CUTOVER, &HostPair::of(ingress_move(matches)));

        let mut routed = Vec::new();
        for m in matches {
            let moved = m.kind == ImageMatchKind::Added || m.changes_host();
            if moved && m.image_kind().is_some_and(|k| k.is_ingress()) {
                if let Some(ref t) = m.target {
                    push_unique(&mut routed, &t.image_name);
                }
            }
        }
        if !routed.is_empty() {
            steps.push(step(
                StepKind::CaddyReload,
                format!("Reload reverse proxy routes for: {}", routed.join(", ")),
                Some("docker exec caddy caddy reload --config /etc/caddy/Caddyfile".to_string()),
                false,
                "1m",
            ));
        }

        steps.push(step(
            StepKind::HealthCheck,
            format!(
                "Check that every service in '{}' is healthy",
                self.target.name
            ),
            None,
            false,
            "5m",
        ));
        steps
    }

    fn cleanup(&self) -> Vec<MigrationStep> {
        let mut retiring = Vec::new();
        for c in &self.diff.container_matches {
            if matches!(c.kind, ContainerMatchKind::Removed | ContainerMatchKind::SplitHost) {
                if let Some(ref s) = c.source {
                    push_unique(&mut retiring, &s.host_name);
                }
            }
        }
        if retiring.is_empty() {
            return Vec::new();
        }

        let hosts = retiring.join(", ");
        vec![
            step(
                StepKind::Manual,
                format!(
                    "Verify nothing still depends on the old placement on {} and take a final backup before destroying anything",
                    hosts
                ),
                None,
                false,
                "15m",
            ),
            step(
                StepKind::TerraformDestroy,
                format!("Destroy resources left behind on: {}", hosts),
                Some("terraform destroy".to_string()),
                false,
                "10m",
            ),
        ]
    }
}

/// Build the migration plan for a computed diff and the caller's answers.
///
/// Unanswered decisions contribute no steps; the plan is always produced.
pub fn generate_plan(
    source: &Topology,
    target: &Topology,
    diff: MigrationDiffResult,
    decisions: Vec<MigrationDecision>,
) -> MigrationPlan {
    let phases: Vec<MigrationPhase> = {
        let builder = PlanBuilder {
            source,
            target,
            diff: &diff,
            decisions: &decisions,
            target_wires: WireResolver::new(target),
        };

        PhaseKind::ALL
            .iter()
            .filter_map(|&kind| {
                let mut steps = builder.steps_for(kind);
                if steps.is_empty() {
                    debug!("Dropping empty phase: {}", kind);
                    return None;
                }
                for (i, s) in steps.iter_mut().enumerate() {
                    s.order = i + 1;
                }
                Some(MigrationPhase {
                    kind,
                    name: kind.display_name().to_string(),
                    description: kind.description().to_string(),
                    steps,
                })
            })
            .collect()
    };

    let plan = MigrationPlan {
        id: Uuid::new_v4().to_string(),
        source_topology_id: source.id.clone(),
        source_topology_name: source.name.clone(),
        target_topology_id: target.id.clone(),
        target_topology_name: target.name.clone(),
        diff,
        decisions,
        phases,
        created_at: Timestamp::now(),
    };

    info!(
        "Generated plan {} with {} phases and {} steps",
        plan.id,
        plan.phases.len(),
        plan.step_count()
    );
    plan
}

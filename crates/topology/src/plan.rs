//! Migration plan types - output of the plan generator.

use crate::diff::MigrationDiffResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use toposhift_common::Timestamp;

/// Category of a human decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionKind {
    HubDatabaseMigration,
    HubCacheMigration,
    SecretHandling,
    DnsCutover,
    DowntimeTolerance,
    VariableValue,
}

/// One enumerated answer to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOption {
    pub key: String,
    pub label: String,
    pub description: String,
}

impl DecisionOption {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            description: description.into(),
        }
    }
}

/// A question the operator must answer before the plan is trustworthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationDecision {
    pub id: String,
    pub kind: DecisionKind,
    pub title: String,
    pub description: String,
    pub required: bool,
    pub options: Vec<DecisionOption>,
    /// Filled in by the caller. For variable decisions this holds the literal value.
    #[serde(default)]
    pub selected_option_key: Option<String>,
}

impl MigrationDecision {
    /// Create an unanswered decision.
    pub fn new(
        id: impl Into<String>,
        kind: DecisionKind,
        title: impl Into<String>,
        description: impl Into<String>,
        required: bool,
        options: Vec<DecisionOption>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: description.into(),
            required,
            options,
            selected_option_key: None,
        }
    }

    /// Check if the caller supplied an answer.
    pub fn is_answered(&self) -> bool {
        self.selected_option_key.is_some()
    }

    /// Check if the given key is one of the enumerated options.
    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|o| o.key == key)
    }
}

/// Kind of atomic action a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Validate,
    TerraformApply,
    VolumeCreate,
    SecretGenerate,
    SecretCopy,
    DatabaseDump,
    DatabaseRestore,
    CacheTransfer,
    DockerInstall,
    DockerRun,
    DnsUpdate,
    CaddyReload,
    HealthCheck,
    TerraformDestroy,
    Manual,
}

/// A single described action in a plan phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStep {
    /// 1-based position within the owning phase.
    pub order: usize,
    pub kind: StepKind,
    pub description: String,
    pub script: Option<String>,
    pub causes_downtime: bool,
    pub estimated_duration: String,
}

/// Ordered plan sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseKind {
    PreCheck,
    Infrastructure,
    DataMigration,
    Provisioning,
    Cutover,
    Cleanup,
}

impl PhaseKind {
    /// All phases in execution order.
    pub const ALL: [PhaseKind; 6] = [
        PhaseKind::PreCheck,
        PhaseKind::Infrastructure,
        PhaseKind::DataMigration,
        PhaseKind::Provisioning,
        PhaseKind::Cutover,
        PhaseKind::Cleanup,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            PhaseKind::PreCheck => "Pre-flight checks",
            PhaseKind::Infrastructure => "Infrastructure",
            PhaseKind::DataMigration => "Data migration",
            PhaseKind::Provisioning => "Provisioning",
            PhaseKind::Cutover => "Cutover",
            PhaseKind::Cleanup => "Cleanup",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PhaseKind::PreCheck => "Confirm both environments are ready before changing anything",
            PhaseKind::Infrastructure => "Create new compute, volumes and secrets",
            PhaseKind::DataMigration => "Move stateful data to its new location",
            PhaseKind::Provisioning => "Install the container runtime and start workloads",
            PhaseKind::Cutover => "Switch traffic to the target topology",
            PhaseKind::Cleanup => "Decommission hosts that are no longer needed",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A group of related steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPhase {
    pub kind: PhaseKind,
    pub name: String,
    pub description: String,
    pub steps: Vec<MigrationStep>,
}

impl MigrationPhase {
    /// Check if any step in this phase takes workloads offline.
    pub fn causes_downtime(&self) -> bool {
        self.steps.iter().any(|s| s.causes_downtime)
    }
}

/// The complete, ordered migration plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    pub id: String,
    pub source_topology_id: String,
    pub source_topology_name: String,
    pub target_topology_id: String,
    pub target_topology_name: String,
    pub diff: MigrationDiffResult,
    pub decisions: Vec<MigrationDecision>,
    /// Non-empty phases in execution order.
    pub phases: Vec<MigrationPhase>,
    pub created_at: Timestamp,
}

impl MigrationPlan {
    /// Find a phase by kind.
    pub fn phase(&self, kind: PhaseKind) -> Option<&MigrationPhase> {
        self.phases.iter().find(|p| p.kind == kind)
    }

    /// Total number of steps across all phases.
    pub fn step_count(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }
}

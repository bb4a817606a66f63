//! Topology model for toposhift.
//!
//! This crate defines the hierarchical topology graph consumed by the
//! migration engine, the diff and plan types it produces, and the
//! upstream validator that checks a topology before it reaches the engine.

pub mod diff;
pub mod plan;
pub mod schema;
pub mod topology;
pub mod validation;

pub use diff::{
    ContainerMatch, ContainerMatchKind, DiffCounts, HostRef, ImageMatch, ImageMatchKind, ImageRef,
    MigrationDiffResult,
};
pub use plan::{
    DecisionKind, DecisionOption, MigrationDecision, MigrationPhase, MigrationPlan,
    MigrationStep, PhaseKind, StepKind,
};
pub use topology::{
    ConfigMap, Container, ContainerKind, Geometry, Image, ImageKind, Port, PortDirection,
    PortType, Topology, Wire,
};
pub use validation::{validate_topology, validate_topology_json, ValidationResult};

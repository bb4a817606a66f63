//! Applying caller answers to generated decisions.

use std::collections::HashMap;
use toposhift_topology::{DecisionKind, MigrationDecision};
use tracing::{debug, warn};

/// Copy answers into `selected_option_key`, keyed by decision id.
///
/// Returns the ids that matched no decision, sorted. An answer naming an
/// option the decision does not offer is still recorded; such a key simply
/// yields no plan steps.
pub fn apply_answers(
    decisions: &mut [MigrationDecision],
    answers: &HashMap<String, String>,
) -> Vec<String> {
    for decision in decisions.iter_mut() {
        let Some(answer) = answers.get(&decision.id) else {
            continue;
        };
        if decision.kind != DecisionKind::VariableValue && !decision.has_option(answer) {
            warn!(
                "Answer '{}' is not an option of decision {}",
                answer, decision.id
            );
        }
        debug!("Answered {} = {}", decision.id, answer);
        decision.selected_option_key = Some(answer.clone());
    }

    let mut unknown: Vec<String> = answers
        .keys()
        .filter(|id| !decisions.iter().any(|d| &d.id == *id))
        .cloned()
        .collect();
    unknown.sort();
    unknown
}

/// Required decisions that still have no answer.
pub fn unanswered_required(decisions: &[MigrationDecision]) -> Vec<&MigrationDecision> {
    decisions
        .iter()
        .filter(|d| d.required && !d.is_answered())
        .collect()
}

//! Markdown runbook rendering for migration plans.

use crate::answers::unanswered_required;
use crate::wires::WireResolver;
use toposhift_topology::{ContainerKind, MigrationPlan, Topology};

/// Render a plan as a Markdown runbook for the operator.
///
/// `target` must be the topology the plan was generated for; it supplies
/// the reverse proxy routes listed at the end.
pub fn render_runbook(plan: &MigrationPlan, target: &Topology) -> String {
    let mut doc = String::new();

    doc.push_str(&format!(
        "# Migration: {} -> {}\n\n",
        plan.source_topology_name, plan.target_topology_name
    ));
    doc.push_str(&format!("- **Plan**: `{}`\n", plan.id));
    doc.push_str(&format!("- **Created**: {}\n", plan.created_at));
    doc.push_str(&format!("- **Steps**: {}\n", plan.step_count()));
    doc.push('\n');

    doc.push_str("## Summary\n\n");
    doc.push_str(&format!("{}\n\n", plan.diff.summary));

    // Decisions
    if !plan.decisions.is_empty() {
        doc.push_str("## Decisions\n\n");
        doc.push_str("| Decision | Required | Answer |\n");
        doc.push_str("|----------|----------|--------|\n");
        for decision in &plan.decisions {
            let required = if decision.required { "Yes" } else { "No" };
            let answer = decision
                .selected_option_key
                .as_deref()
                .map(|key| format!("`{}`", key))
                .unwrap_or_else(|| "_unanswered_".to_string());
            doc.push_str(&format!(
                "| {} | {} | {} |\n",
                decision.title, required, answer
            ));
        }
        doc.push('\n');

        let pending = unanswered_required(&plan.decisions);
        if !pending.is_empty() {
            doc.push_str(&format!(
                "> **Warning**: {} required decision(s) unanswered. Steps depending on them are missing from this plan.\n\n",
                pending.len()
            ));
        }
    }

    for (i, phase) in plan.phases.iter().enumerate() {
        doc.push_str(&format!("## {}. {}\n\n", i + 1, phase.name));
        doc.push_str(&format!("{}\n\n", phase.description));

        for step in &phase.steps {
            doc.push_str(&format!(
                "{}. **{:?}** {} _({})_",
                step.order, step.kind, step.description, step.estimated_duration
            ));
            if step.causes_downtime {
                doc.push_str(" **[downtime]**");
            }
            doc.push('\n');
            if let Some(ref script) = step.script {
                doc.push_str("\n   ```sh\n");
                for line in script.lines() {
                    doc.push_str(&format!("   {}\n", line));
                }
                doc.push_str("   ```\n\n");
            }
        }
        doc.push('\n');
    }

    // Ingress routes
    let resolver = WireResolver::new(target);
    let mut routes = Vec::new();
    for proxy in target.containers_of_kind(ContainerKind::ReverseProxy) {
        for (image, path) in resolver.resolve_caddy_upstreams(proxy) {
            let host = resolver
                .find_host_for(&image.id)
                .map(|h| h.name.as_str())
                .unwrap_or("-");
            routes.push((proxy.name.as_str(), path, image.name.as_str(), host));
        }
    }
    if !routes.is_empty() {
        doc.push_str("## Ingress routes\n\n");
        doc.push_str("| Proxy | Path | Service | Host |\n");
        doc.push_str("|-------|------|---------|------|\n");
        for (proxy, path, service, host) in routes {
            doc.push_str(&format!(
                "| {} | `{}` | {} | {} |\n",
                proxy, path, service, host
            ));
        }
        doc.push('\n');
    }

    doc
}

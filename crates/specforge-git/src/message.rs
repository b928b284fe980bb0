//! Commit message template

use specforge_utils::types::PhaseStep;

/// Agent key to role title. Unknown keys are shown verbatim.
const AGENT_ROLES: &[(&str, &str)] = &[
    ("analyst", "Business Analyst"),
    ("pm", "Product Manager"),
    ("architect", "Solutions Architect"),
    ("designer", "UX Designer"),
    ("scrummaster", "Scrum Master"),
    ("devops", "DevOps Engineer"),
    ("validator", "Validation Agent"),
];

/// Role title for an agent key.
#[must_use]
pub fn agent_role(agent: &str) -> &str {
    AGENT_ROLES
        .iter()
        .find(|(key, _)| *key == agent)
        .map_or(agent, |(_, role)| role)
}

/// Render the phase commit message.
///
/// ```text
/// {phase}: {phase-name} artifacts for {project-name}
///
/// Artifacts: {artifacts}
/// {artifact-list}
///
/// Generated by: {agent-role} ({owner})
/// Duration: {duration}ms
/// ```
#[must_use]
pub fn render_commit_message(
    phase: PhaseStep,
    project_name: &str,
    artifacts: &[String],
    agent: &str,
    duration_ms: u64,
) -> String {
    let names: Vec<&str> = artifacts.iter().map(|a| file_name(a)).collect();
    let list = names
        .iter()
        .map(|n| format!("- {n}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{phase}: {phase_name} artifacts for {project_name}\n\n\
         Artifacts: {artifacts}\n\
         {list}\n\n\
         Generated by: {role} ({agent})\n\
         Duration: {duration_ms}ms",
        phase = phase.as_str(),
        phase_name = phase.display_name(),
        artifacts = names.join(", "),
        role = agent_role(agent),
    )
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

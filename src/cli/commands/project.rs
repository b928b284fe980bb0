//! Project commands: `init`, `status`, `list`

use anyhow::Result;

use specforge_orchestrator::OrchestratorHandle;

use super::emit;

pub(crate) async fn execute_init_command(
    handle: &OrchestratorHandle,
    slug: &str,
    name: Option<&str>,
    json: bool,
) -> Result<()> {
    let result = handle.create_project(slug, name.unwrap_or(slug)).await;
    emit(result, json, |project| {
        println!(
            "✓ Created project {} ({}) at {}",
            project.id, project.name, project.current_phase
        );
    })
}

pub(crate) async fn execute_status_command(
    handle: &OrchestratorHandle,
    project_id: &str,
    json: bool,
) -> Result<()> {
    let result = handle.status(project_id).await;
    emit(result, json, |status| {
        let project = &status.project;
        println!("Project: {} ({})", project.id, project.name);
        println!("  Current phase: {}", project.current_phase);
        let completed: Vec<&str> = project.phases_completed.iter().map(|p| p.as_str()).collect();
        if completed.is_empty() {
            println!("  Completed: none");
        } else {
            println!("  Completed: {}", completed.join(" → "));
        }
        if let Some(stack) = &project.stack_choice {
            println!("  Stack: {stack}");
        }
        println!("  Rollbacks: {}", project.rollback_count);
        if project.handoff_generated {
            println!("  Handoff: generated");
        }

        println!();
        println!("Gates:");
        for gate in &status.gates {
            let blocking = if gate.definition.blocking { " (blocking)" } else { "" };
            println!("  {:<22} {}{}", gate.definition.name.as_str(), gate.status, blocking);
        }

        if !status.snapshots.is_empty() {
            println!();
            println!("Snapshots:");
            for snapshot in &status.snapshots {
                let commit = snapshot.git_commit_hash.as_deref().unwrap_or("-");
                println!(
                    "  v{:<3} {:<16} {} artifact(s)  commit {}",
                    snapshot.version,
                    snapshot.phase.as_str(),
                    snapshot.artifacts.len(),
                    commit
                );
            }
        }
    })
}

pub(crate) async fn execute_list_command(handle: &OrchestratorHandle, json: bool) -> Result<()> {
    let result = handle.list_projects().await;
    emit(result, json, |projects| {
        if projects.is_empty() {
            println!("No projects");
            return;
        }
        for project in projects {
            println!("{:<24} {}", project.id, project.current_phase);
        }
    })
}

//! Plan file handling
//!
//! Each session has a markdown plan file in the project's `.vibe/` directory
//! with one `## <Phase>` section per phase. Only what the session lifecycle
//! needs lives here: path derivation, skeleton creation, task extraction and
//! removal.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::identity::{short_digest, DEFAULT_BRANCH};
use crate::types::{title_case, PhaseResult, WorkflowGraph};

/// Directory holding plan files and project workflow overrides
pub const VIBE_DIR: &str = ".vibe";

/// What the composer needs to know about a plan file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanFileSummary {
    pub path: String,
    pub exists: bool,
    /// Unchecked tasks of the current phase's section
    pub open_tasks: Vec<String>,
}

/// Plan file location for a branch
///
/// Branch names that need sanitizing get a hash suffix, so `feature/login`
/// and `feature-login` never share a file.
pub fn plan_file_path(project_path: &Path, branch: &str) -> PathBuf {
    let dir = project_path.join(VIBE_DIR);
    match branch {
        DEFAULT_BRANCH | "main" | "master" => dir.join("development-plan.md"),
        other => {
            let safe: String = other
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
                .collect();
            if safe == other {
                dir.join(format!("development-plan-{}.md", safe))
            } else {
                dir.join(format!("development-plan-{}-{}.md", safe, short_digest(other)))
            }
        }
    }
}

fn section_heading(phase: &str) -> String {
    format!("## {}", title_case(phase))
}

/// Write a skeleton plan unless one exists. Returns whether a file was created.
pub async fn ensure_plan_file(path: &Path, graph: &WorkflowGraph) -> PhaseResult<bool> {
    if tokio::fs::try_exists(path).await? {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut content = format!(
        "# Development Plan\n\n*Workflow: {}*\n\n## Goal\n\n*Describe the goal of this work.*\n",
        graph.info().display_name
    );
    for phase in &graph.phases {
        content.push_str(&format!(
            "\n{}\n\n*{}*\n\n### Tasks\n\n*Add tasks as they are identified.*\n",
            section_heading(&phase.name),
            phase.description
        ));
    }
    content.push_str("\n## Key Decisions\n\n## Notes\n");

    tokio::fs::write(path, content).await?;
    tracing::info!("Created plan file at {:?}", path);
    Ok(true)
}

/// Existence and open tasks of `phase`
pub async fn summarize(path: &Path, phase: &str) -> PlanFileSummary {
    let content = tokio::fs::read_to_string(path).await.ok();
    PlanFileSummary {
        path: path.display().to_string(),
        exists: content.is_some(),
        open_tasks: content
            .map(|c| open_tasks(&c, phase))
            .unwrap_or_default(),
    }
}

/// Unchecked `- [ ]` items between the phase heading and the next `## ` heading
pub fn open_tasks(content: &str, phase: &str) -> Vec<String> {
    let heading = section_heading(phase);
    let mut in_section = false;
    let mut tasks = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("## ") {
            in_section = trimmed.eq_ignore_ascii_case(&heading);
            continue;
        }
        if in_section {
            if let Some(task) = trimmed.strip_prefix("- [ ]").map(str::trim) {
                if !is_placeholder(task) {
                    tasks.push(task.to_string());
                }
            }
        }
    }
    tasks
}

// `*...*` hint text, not a task
fn is_placeholder(task: &str) -> bool {
    task.is_empty() || (task.len() > 1 && task.starts_with('*') && task.ends_with('*'))
}

/// Delete the plan file; a missing file is not an error
pub async fn remove_plan_file(path: &Path) -> PhaseResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::builtin_workflows;
    use tempfile::TempDir;

    const PLAN: &str = "\
# Development Plan

## Requirements

- [x] Ask about users
- [ ] Confirm acceptance criteria
  - [ ] Nested follow-up

## Design

- [ ] Pick storage
";

    #[test]
    fn test_plan_file_path_per_branch() {
        let project = Path::new("/work/shop");
        assert_eq!(
            plan_file_path(project, DEFAULT_BRANCH),
            Path::new("/work/shop/.vibe/development-plan.md")
        );
        assert_eq!(
            plan_file_path(project, "main"),
            Path::new("/work/shop/.vibe/development-plan.md")
        );
        assert_eq!(
            plan_file_path(project, "feature-login"),
            Path::new("/work/shop/.vibe/development-plan-feature-login.md")
        );
    }

    #[test]
    fn test_sanitized_branches_do_not_collide() {
        let project = Path::new("/work/shop");
        let slashed = plan_file_path(project, "feature/login");
        let dashed = plan_file_path(project, "feature-login");

        assert_ne!(slashed, dashed);
        assert_eq!(
            slashed,
            project
                .join(".vibe")
                .join(format!("development-plan-feature-login-{}.md", short_digest("feature/login")))
        );
        assert_eq!(plan_file_path(project, "feature/login"), slashed);
    }

    #[test]
    fn test_placeholder_is_not_a_task() {
        let content = "## Design\n\n- [ ] *Add tasks as they are identified*\n- [ ]\n- [ ] Pick *storage*\n";
        assert_eq!(open_tasks(content, "design"), vec!["Pick *storage*"]);
    }

    #[test]
    fn test_open_tasks_of_phase() {
        assert_eq!(
            open_tasks(PLAN, "requirements"),
            vec!["Confirm acceptance criteria", "Nested follow-up"]
        );
        assert_eq!(open_tasks(PLAN, "design"), vec!["Pick storage"]);
        assert!(open_tasks(PLAN, "testing").is_empty());
    }

    #[tokio::test]
    async fn test_ensure_plan_file_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = plan_file_path(dir.path(), "main");
        let graph = builtin_workflows().unwrap().remove(0);

        assert!(ensure_plan_file(&path, &graph).await.unwrap());
        let created = std::fs::read_to_string(&path).unwrap();
        assert!(created.contains("## Requirements"));
        assert!(created.contains("## Qa"));
        assert!(open_tasks(&created, "requirements").is_empty());

        std::fs::write(&path, PLAN).unwrap();
        assert!(!ensure_plan_file(&path, &graph).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), PLAN);
    }

    #[tokio::test]
    async fn test_summarize_and_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.md");

        let missing = summarize(&path, "design").await;
        assert!(!missing.exists);
        assert!(missing.open_tasks.is_empty());

        std::fs::write(&path, PLAN).unwrap();
        let summary = summarize(&path, "design").await;
        assert!(summary.exists);
        assert_eq!(summary.open_tasks, vec!["Pick storage"]);

        assert!(remove_plan_file(&path).await.unwrap());
        assert!(!remove_plan_file(&path).await.unwrap());
    }
}

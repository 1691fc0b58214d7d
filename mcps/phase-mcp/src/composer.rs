//! Instruction composition
//!
//! Joins phase guidance with session and plan file context into the text
//! returned to the client.

use crate::plan::PlanFileSummary;
use crate::types::Session;

/// Guidance followed by session context and plan file pointers
pub fn compose(guidance: &str, session: &Session, plan: &PlanFileSummary) -> String {
    let mut out = String::with_capacity(guidance.len() + 512);
    out.push_str(guidance.trim_end());

    out.push_str("\n\n**Session:**\n");
    out.push_str(&format!("- Phase: `{}`\n", session.current_phase));
    out.push_str(&format!("- Workflow: `{}`\n", session.workflow_name));
    out.push_str(&format!("- Session: `{}`\n", session.session_key));

    out.push_str("\n**Plan File:**\n");
    if plan.exists {
        out.push_str(&format!("- Plan file: `{}`\n", plan.path));
    } else {
        out.push_str(&format!("- Plan file: `{}` (not created yet)\n", plan.path));
    }

    if plan.open_tasks.is_empty() {
        out.push_str("- No open tasks recorded for this phase. Add tasks to the plan file as you identify them.\n");
    } else {
        out.push_str("- Open tasks for this phase:\n");
        for task in &plan.open_tasks {
            out.push_str(&format!("  - [ ] {}\n", task));
        }
    }
    out.push_str("- Mark tasks `[x]` when done and record key decisions in the plan file.\n");

    out
}

//! `formulary remove` command implementation.

use formulary_core::error::FormularyResult;
use formulary_installer::reconciler::plan_removal;
use formulary_installer::{apply_plan, WorkbookState};

use super::CommandContext;

/// Execute the `formulary remove` command
pub async fn execute(packages: Vec<String>, ctx: &CommandContext) -> FormularyResult<()> {
    let store = ctx.workbook();
    let state = WorkbookState::load(&store).await?;

    let plan = plan_removal(&state, &packages)?;
    let summary = apply_plan(&store, &state, &plan).await?;

    for name in &plan.removed_packages {
        ctx.output.line(&format!("  - {}", name));
    }
    ctx.output.success(&format!(
        "Removed {} package(s) and {} function(s)",
        plan.removed_packages.len(),
        summary.deleted
    ));
    Ok(())
}

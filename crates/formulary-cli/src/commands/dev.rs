//! `formulary dev` command implementation.
//!
//! Turns an empty workbook into a checkout of a published package: its
//! dependencies are installed and locked, its own functions become project
//! source and its metadata becomes the project metadata.

use formulary_core::error::FormularyResult;
use formulary_core::types::Lockfile;
use formulary_installer::{apply_plan, WorkbookState};
use std::time::Instant;

use super::install::{report_changes, report_summary};
use super::CommandContext;

/// Execute the `formulary dev` command
pub async fn execute(package: String, version: Option<String>, ctx: &CommandContext) -> FormularyResult<()> {
    let start_time = Instant::now();
    let store = ctx.workbook();
    let state = WorkbookState::load(&store).await?;

    ctx.output.step("🛠", &format!("Checking out {} for development", package));
    let outcome = ctx
        .reconciler()?
        .develop(&state, &package, version.as_deref())
        .await?;

    let summary = apply_plan(&store, &state, &outcome.plan).await?;
    report_changes(ctx, &Lockfile::new(), &outcome.plan);
    ctx.output.line(&format!(
        "Project {} v{} with {} source functions",
        outcome.plan.project.name,
        outcome.version,
        outcome.sources.len()
    ));
    report_summary(ctx, &summary, start_time);
    Ok(())
}

//! `formulary upgrade` command implementation.

use formulary_core::error::FormularyResult;
use formulary_installer::{apply_plan, WorkbookState};
use std::time::Instant;

use super::aliases::{rename_maps, retry_with_aliases};
use super::install::{alias_source, report_summary};
use super::CommandContext;

/// Execute the `formulary upgrade` command
pub async fn execute(
    packages: Vec<String>,
    renames: Vec<String>,
    ctx: &CommandContext,
) -> FormularyResult<()> {
    let start_time = Instant::now();
    let store = ctx.workbook();
    let state = WorkbookState::load(&store).await?;

    ctx.output.step("🔍", "Checking for newer versions");
    let reconciler = ctx.reconciler()?;
    let mut renames = rename_maps(&renames)?;
    let mut aliases = alias_source(ctx);
    let (reconciler, state_ref, packages_ref) = (&reconciler, &state, &packages);
    let outcome = retry_with_aliases(&mut renames, aliases.as_mut(), move |renames| async move {
        reconciler.upgrade(state_ref, packages_ref, &renames).await
    })
    .await?;

    let Some(plan) = outcome.plan else {
        ctx.output.success("All packages are up to date");
        return Ok(());
    };

    for (name, (old, new)) in &outcome.upgrades {
        ctx.output.line(&format!("  ~ {} {} -> {}", name, old, new));
    }
    let summary = apply_plan(&store, &state, &plan).await?;
    report_summary(ctx, &summary, start_time);
    Ok(())
}

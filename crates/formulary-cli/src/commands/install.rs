//! `formulary install` command implementation.
//!
//! Plans the install against a workbook snapshot, asks for aliases when
//! functions collide, then applies the plan.

use formulary_core::error::{FormularyError, FormularyResult};
use formulary_core::types::Lockfile;
use formulary_installer::{apply_plan, ApplySummary, InstallTarget, Plan, WorkbookState};
use std::time::Instant;

use super::aliases::{rename_maps, retry_with_aliases, AliasSource, NoPrompt, TerminalPrompt};
use super::CommandContext;

/// Execute the `formulary install` command
pub async fn execute(
    packages: Vec<String>,
    local: bool,
    renames: Vec<String>,
    ctx: &CommandContext,
) -> FormularyResult<()> {
    let start_time = Instant::now();
    let store = ctx.workbook();
    let state = WorkbookState::load(&store).await?;

    if packages.is_empty() && state.project.is_none() {
        return Err(FormularyError::NoProject);
    }
    let targets: Vec<InstallTarget> = packages
        .iter()
        .map(|package| InstallTarget::from_arg(package, local))
        .collect();

    if targets.is_empty() {
        ctx.output.step("📦", "Installing project dependencies");
    } else {
        ctx.output.step("📦", &format!("Installing {}", packages.join(", ")));
    }

    let reconciler = ctx.reconciler()?;
    let mut renames = rename_maps(&renames)?;
    let mut aliases = alias_source(ctx);
    let (reconciler, state_ref, targets_ref) = (&reconciler, &state, &targets);
    let plan = retry_with_aliases(&mut renames, aliases.as_mut(), move |renames| async move {
        reconciler.install(state_ref, targets_ref, &renames).await
    })
    .await?;

    let summary = apply_plan(&store, &state, &plan).await?;
    report_changes(ctx, &state.lockfile, &plan);
    report_summary(ctx, &summary, start_time);
    Ok(())
}

/// Prompt on a terminal, fail on collisions otherwise
pub(crate) fn alias_source(ctx: &CommandContext) -> Box<dyn AliasSource + '_> {
    if ctx.interactive {
        Box::new(TerminalPrompt {
            output: &ctx.output,
        })
    } else {
        Box::new(NoPrompt)
    }
}

/// List added, changed and removed packages
pub(crate) fn report_changes(ctx: &CommandContext, previous: &Lockfile, plan: &Plan) {
    for (name, entry) in &plan.lockfile.packages {
        match previous.get(name) {
            None => ctx.output.line(&format!("  + {} {}", name, entry.version)),
            Some(old) if old.version != entry.version => ctx
                .output
                .line(&format!("  ~ {} {} -> {}", name, old.version, entry.version)),
            Some(_) => {},
        }
    }
    for name in &plan.removed_packages {
        ctx.output.line(&format!("  - {}", name));
    }
}

pub(crate) fn report_summary(ctx: &CommandContext, summary: &ApplySummary, start_time: Instant) {
    ctx.output.success(&format!(
        "Workbook updated in {:.2}s: {} created, {} updated, {} unchanged, {} deleted",
        start_time.elapsed().as_secs_f64(),
        summary.created,
        summary.updated,
        summary.unchanged,
        summary.deleted
    ));
}

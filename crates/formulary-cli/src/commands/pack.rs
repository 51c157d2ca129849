//! `formulary pack` command implementation.

use formulary_core::error::FormularyResult;
use formulary_installer::{pack_project, WorkbookState};
use std::path::PathBuf;

use super::CommandContext;

/// Execute the `formulary pack` command
pub async fn execute(out_dir: PathBuf, ctx: &CommandContext) -> FormularyResult<()> {
    let store = ctx.workbook();
    let state = WorkbookState::load(&store).await?;

    ctx.output.step("📦", "Packing project functions");
    let outcome = pack_project(&state, &ctx.resolve_std(&out_dir))?;
    ctx.output.success(&format!(
        "Wrote {} ({} functions, {} bytes)",
        outcome.path.display(),
        outcome.functions,
        outcome.bytes
    ));
    Ok(())
}

//! `formulary cache` command implementation.

use formulary_core::error::FormularyResult;
use formulary_registry::Registry;

use super::CommandContext;
use crate::{CacheAction, ClearTarget};

/// Execute a `formulary cache` subcommand
pub async fn execute(action: CacheAction, ctx: &CommandContext) -> FormularyResult<()> {
    match action {
        CacheAction::Clear { target } => {
            if matches!(target, ClearTarget::Index | ClearTarget::All) {
                ctx.index_cache().clear();
                ctx.output.success("Cleared registry index cache");
            }
            if matches!(target, ClearTarget::Packages | ClearTarget::All) {
                ctx.artifacts()?.clear()?;
                ctx.output.success(&format!("Cleared package archives in {}", ctx.config.cache_dir));
            }
        },
        CacheAction::Update => {
            ctx.output.step("🔄", &format!("Refreshing {}", ctx.config.registry_url));
            let index = ctx.registry()?.refresh().await?;
            ctx.output.success(&format!("Registry index lists {} packages", index.len()));
        },
        CacheAction::Info => {
            let stats = ctx.artifacts()?.stats()?;
            let index = ctx.index_cache().stats();
            ctx.output.line(&format!("Cache at {}", ctx.config.cache_dir));
            ctx.output.field("Packages", &stats.packages.to_string());
            ctx.output.field("Archives", &stats.artifacts.to_string());
            ctx.output.field("Size", &format!("{} bytes", stats.total_bytes));
            ctx.output.field(
                "Index entries",
                &format!("{} ({} fresh)", index.total_entries, index.fresh_entries),
            );
        },
    }
    Ok(())
}

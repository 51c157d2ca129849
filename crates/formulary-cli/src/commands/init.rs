//! `formulary init` command implementation.

use formulary_core::error::FormularyResult;
use formulary_core::Package;
use formulary_installer::reconciler::DEFAULT_PROJECT_NAME;
use formulary_installer::{init_project, InitOptions};

use super::CommandContext;

/// Execute the `formulary init` command
pub async fn execute(
    name: Option<String>,
    mut options: InitOptions,
    ctx: &CommandContext,
) -> FormularyResult<()> {
    options.name = name.unwrap_or_else(|| default_name(ctx));
    let store = ctx.workbook();

    ctx.output.step("📝", &format!("Initializing {} in {}", options.name, store.path()));
    if init_project(&store, &options).await? {
        let verb = if options.force { "Reinitialized" } else { "Created" };
        ctx.output.success(&format!("{} project {} v{}", verb, options.name, options.version));
    } else {
        ctx.output.warn("Workbook already has project metadata or a lockfile; use --force to overwrite");
    }
    Ok(())
}

/// The working directory name when it is a valid package name
fn default_name(ctx: &CommandContext) -> String {
    ctx.cwd
        .file_name()
        .filter(|name| Package::is_valid_name(name))
        .unwrap_or(DEFAULT_PROJECT_NAME)
        .to_string()
}

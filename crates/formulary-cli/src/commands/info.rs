//! `formulary info` command implementation.

use formulary_core::error::{FormularyError, FormularyResult};
use formulary_core::Version;
use formulary_installer::WorkbookState;
use formulary_registry::{PackageEntry, Registry, VersionMetadata};

use super::CommandContext;

/// Execute the `formulary info` command
pub async fn execute(
    package: Option<String>,
    version: Option<String>,
    ctx: &CommandContext,
) -> FormularyResult<()> {
    let state = WorkbookState::load(&ctx.workbook()).await?;
    match package {
        Some(name) => package_info(&name, version.as_deref(), &state, ctx).await,
        None => project_info(&state, ctx),
    }
}

fn project_info(state: &WorkbookState, ctx: &CommandContext) -> FormularyResult<()> {
    let project = state.project()?;

    ctx.output.line(&format!("{} v{}", project.name, project.version));
    if !project.description.is_empty() {
        ctx.output.field("Description", &project.description);
    }
    for (label, key) in [("Author", "author"), ("License", "license")] {
        if let Some(value) = project.extra_str(key) {
            ctx.output.field(label, value);
        }
    }
    if project.dependencies.is_empty() {
        ctx.output.field("Dependencies", "none");
    } else {
        ctx.output.field("Dependencies", &project.dependencies.join(", "));
    }

    if state.lockfile.is_empty() {
        ctx.output.info("No packages installed");
        return Ok(());
    }
    ctx.output.line("Installed packages:");
    for (name, entry) in &state.lockfile.packages {
        ctx.output.line(&format!(
            "  {} {} ({} functions)",
            name,
            entry.version,
            entry.functions.len()
        ));
    }
    Ok(())
}

async fn package_info(
    name: &str,
    version: Option<&str>,
    state: &WorkbookState,
    ctx: &CommandContext,
) -> FormularyResult<()> {
    let index = ctx.registry()?.index().await?;
    let entry = index.package(name).ok_or_else(|| FormularyError::PackageNotFound {
        name: name.to_string(),
    })?;

    ctx.output.line(name);
    describe(entry, ctx);
    let latest = index.latest_version(name);
    if let Some(latest) = &latest {
        ctx.output.field("Latest", &latest.to_string());
    }
    if let Some(installed) = state.lockfile.get(name) {
        ctx.output.field("Installed", &installed.version);
    }

    let shown = match version {
        Some(text) => Some(text.parse::<Version>()?),
        None => latest,
    };
    if let Some(shown) = shown {
        let key = index
            .version_key(name, &shown)
            .ok_or_else(|| FormularyError::VersionNotFound {
                name: name.to_string(),
                version: shown.to_string(),
            })?;
        let dependencies = entry
            .versions
            .get(key)
            .map(|metadata| metadata.dependencies.as_slice())
            .unwrap_or_default();
        let label = format!("Dependencies of {}", key);
        if dependencies.is_empty() {
            ctx.output.field(&label, "none");
        } else {
            ctx.output.field(&label, &dependencies.join(", "));
        }
    }

    ctx.output.line("Versions:");
    for (version, metadata) in sorted_versions(entry) {
        if metadata.dependencies.is_empty() {
            ctx.output.line(&format!("  {}", version));
        } else {
            ctx.output.line(&format!("  {} (requires {})", version, metadata.dependencies.join(", ")));
        }
    }
    Ok(())
}

fn describe(entry: &PackageEntry, ctx: &CommandContext) {
    if !entry.description.is_empty() {
        ctx.output.field("Description", &entry.description);
    }
    let optional = [
        ("Author", &entry.author),
        ("License", &entry.license),
        ("Homepage", &entry.homepage),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            ctx.output.field(label, value);
        }
    }
}

/// Versions newest first; unparseable keys sort last in index order
pub(crate) fn sorted_versions(entry: &PackageEntry) -> Vec<(&str, &VersionMetadata)> {
    let mut versions: Vec<(Option<Version>, &str, &VersionMetadata)> = entry
        .versions
        .iter()
        .map(|(key, metadata)| (key.parse::<Version>().ok(), key.as_str(), metadata))
        .collect();
    versions.sort_by(|a, b| match (&a.0, &b.0) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    versions.into_iter().map(|(_, key, metadata)| (key, metadata)).collect()
}

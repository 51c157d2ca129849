//! Removal closure

use formulary_core::error::FormularyError;
use formulary_core::types::{Dependency, Lockfile};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use super::{Plan, WorkbookState};
use crate::InstallerResult;

/// Every package reachable from `roots` through locked dependencies.
///
/// Roots are always part of the result, locked or not.
pub fn dependency_closure<I>(lockfile: &Lockfile, roots: I) -> HashSet<String>
where
    I: IntoIterator<Item = String>,
{
    let mut reachable: HashSet<String> = HashSet::new();
    let mut pending: Vec<String> = Vec::new();
    for root in roots {
        if reachable.insert(root.clone()) {
            pending.push(root);
        }
    }

    while let Some(name) = pending.pop() {
        let Some(entry) = lockfile.get(&name) else {
            continue;
        };
        for dependency in entry.dependency_names() {
            if reachable.insert(dependency.to_string()) {
                pending.push(dependency.to_string());
            }
        }
    }
    reachable
}

/// Find the declared dependency a remove target refers to.
///
/// A target is a package name, or the path of a local archive dependency.
fn match_target<'d>(declared: &'d [Dependency], target: &str) -> Option<&'d str> {
    if let Some(dependency) = declared.iter().find(|d| d.name == target) {
        return Some(&dependency.name);
    }

    let wanted = std::fs::canonicalize(target).ok();
    declared
        .iter()
        .find(|d| match d.local_path() {
            Some(path) => {
                let same_file = wanted
                    .as_deref()
                    .zip(std::fs::canonicalize(path).ok())
                    .map_or(false, |(a, b)| a == b.as_path());
                same_file || Path::new(path).ends_with(target)
            },
            None => false,
        })
        .map(|d| d.name.as_str())
}

/// Plan removing `targets` from the project.
///
/// Packages still reachable from the remaining direct dependencies are
/// kept; every other locked package is pruned with its functions. Unknown
/// targets fail with `NotInstalled` before anything is planned.
pub fn plan_removal(state: &WorkbookState, targets: &[String]) -> InstallerResult<Plan> {
    let project = state.project()?;
    let declared = project.parsed_dependencies()?;

    let mut removed_names: Vec<String> = Vec::new();
    for target in targets {
        let name = match_target(&declared, target).ok_or_else(|| FormularyError::NotInstalled {
            name: target.clone(),
        })?;
        if !removed_names.iter().any(|n| n == name) {
            removed_names.push(name.to_string());
        }
    }

    let mut project = project.clone();
    for name in &removed_names {
        project.remove_dependency(name);
    }

    let roots = project.parsed_dependencies()?.into_iter().map(|d| d.name);
    let keep = dependency_closure(&state.lockfile, roots);

    let mut lockfile = state.lockfile.clone();
    let mut functions_to_delete = Vec::new();
    let mut removed_packages = Vec::new();
    for (name, entry) in &state.lockfile.packages {
        if keep.contains(name) {
            continue;
        }
        debug!(package = %name, functions = entry.functions.len(), "pruning package");
        functions_to_delete.extend(entry.functions.iter().cloned());
        lockfile.remove(name);
        removed_packages.push(name.clone());
    }

    let orphans: Vec<&String> = removed_packages
        .iter()
        .filter(|p| !removed_names.contains(p))
        .collect();
    if !orphans.is_empty() {
        info!(orphans = ?orphans, "also removing orphaned dependencies");
    }

    Ok(Plan {
        project,
        functions: IndexMap::new(),
        lockfile,
        functions_to_delete,
        removed_packages,
    })
}

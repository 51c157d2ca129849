use formulary_core::utils::function_hash;
use tracing::{debug, info};

use super::{Plan, WorkbookState};
use crate::metadata::MetadataManager;
use crate::store::FunctionStore;
use crate::InstallerResult;

/// Counts of the store operations issued by [`apply_plan`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

/// Persist a plan computed from `state`.
///
/// Deletions go first, then package functions (unchanged bodies are not
/// rewritten), then the project metadata and finally the lockfile, so an
/// interrupted run never leaves a lockfile that claims functions which were
/// not written.
pub async fn apply_plan<S: FunctionStore>(
    store: &S,
    state: &WorkbookState,
    plan: &Plan,
) -> InstallerResult<ApplySummary> {
    let mut summary = ApplySummary::default();

    for name in &plan.functions_to_delete {
        if plan.functions.contains_key(name) {
            continue;
        }
        debug!(function = %name, "deleting");
        store.delete_function(name).await?;
        summary.deleted += 1;
    }

    for (name, function) in &plan.functions {
        match state.functions.get(name) {
            Some(existing) if function_hash(existing) == function_hash(function) => {
                summary.unchanged += 1;
            },
            Some(_) => {
                store.update_function(function).await?;
                summary.updated += 1;
            },
            None => {
                store.create_function(function).await?;
                summary.created += 1;
            },
        }
    }

    let metadata = MetadataManager::new(store);
    metadata.save_project_metadata(&plan.project).await?;
    metadata.save_lockfile(&plan.lockfile).await?;

    info!(
        created = summary.created,
        updated = summary.updated,
        unchanged = summary.unchanged,
        deleted = summary.deleted,
        "workbook updated"
    );
    Ok(summary)
}

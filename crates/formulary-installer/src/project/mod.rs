//! The project being authored in a workbook

use formulary_cache::create_archive;
use formulary_core::error::FormularyError;
use formulary_core::types::{is_reserved, FunctionDefinition, Lockfile, ProjectMetadata, Version};
use formulary_core::Package;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::metadata::MetadataManager;
use crate::reconciler::WorkbookState;
use crate::store::FunctionStore;
use crate::InstallerResult;

/// Fields written by [`init_project`]
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: Option<String>,
    pub license: Option<String>,
    /// Replace existing metadata and lockfile
    pub force: bool,
}

/// Write initial project metadata and an empty lockfile.
///
/// Returns `false` and leaves the workbook untouched when it already has
/// project metadata or a lockfile, unless `force` is set.
pub async fn init_project<S: FunctionStore>(store: &S, options: &InitOptions) -> InstallerResult<bool> {
    validate(&options.name, &options.version)?;

    let metadata = MetadataManager::new(store);
    let (project, lockfile) = metadata.load().await?;
    if (project.is_some() || lockfile.is_some()) && !options.force {
        return Ok(false);
    }

    let mut project = ProjectMetadata::new(&options.name, &options.version);
    project.description = options.description.clone();
    let optional = [("author", &options.author), ("license", &options.license)];
    for (key, value) in optional {
        if let Some(value) = value {
            project.extra.insert(key.to_string(), value.clone().into());
        }
    }
    metadata.save_project_metadata(&project).await?;
    metadata.save_lockfile(&Lockfile::new()).await?;
    info!(project = %options.name, version = %options.version, force = options.force, "initialized project");
    Ok(true)
}

fn validate(name: &str, version: &str) -> InstallerResult<()> {
    if !Package::is_valid_name(name) {
        return Err(FormularyError::ConfigValidation {
            field: "name".to_string(),
            reason: format!("'{}' may only contain letters, digits, '-' and '_'", name),
        });
    }
    version.parse::<Version>()?;
    Ok(())
}

/// The functions a project publishes: everything except reserved functions
/// and functions installed from dependencies
pub fn package_functions(state: &WorkbookState) -> IndexMap<String, FunctionDefinition> {
    let owners = state.lockfile.ownership_map();
    state
        .functions
        .iter()
        .filter(|(name, _)| !is_reserved(name) && !owners.contains_key(name.as_str()))
        .map(|(name, function)| (name.clone(), function.clone()))
        .collect()
}

/// A written package archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub functions: usize,
}

/// Build `{name}-{version}.gspkg` in `out_dir` from the project's own functions
pub fn pack_project(state: &WorkbookState, out_dir: &Path) -> InstallerResult<PackOutcome> {
    let project = state.project()?;
    validate(&project.name, &project.version)?;

    let functions = package_functions(state);
    if functions.is_empty() {
        return Err(FormularyError::NothingToPack {
            name: project.name.clone(),
        });
    }

    let path = out_dir.join(format!("{}-{}.gspkg", project.name, project.version));
    let bytes = create_archive(&path, project, &functions, None)?;
    info!(path = %path.display(), bytes, functions = functions.len(), "packed project");

    Ok(PackOutcome {
        path,
        bytes,
        functions: functions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFunctionStore;
    use formulary_cache::extract_archive;
    use formulary_core::types::PackageLock;

    fn options(name: &str, version: &str) -> InitOptions {
        InitOptions {
            name: name.to_string(),
            version: version.to_string(),
            ..InitOptions::default()
        }
    }

    #[tokio::test]
    async fn test_init_writes_metadata_once() {
        let store = MemoryFunctionStore::new();
        let mut first = options("demo", "0.1.0");
        first.description = "A demo".to_string();
        first.author = Some("Ada".to_string());
        assert!(init_project(&store, &first).await.unwrap());

        let state = WorkbookState::load(&store).await.unwrap();
        let project = state.project.unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(project.description, "A demo");
        assert_eq!(project.extra_str("author"), Some("Ada"));
        assert_eq!(project.extra_str("license"), None);
        assert!(state.functions.contains_key("__LOCK__"));

        assert!(!init_project(&store, &options("other", "1.0.0")).await.unwrap());
        let state = WorkbookState::load(&store).await.unwrap();
        assert_eq!(state.project.unwrap().name, "demo");
    }

    #[tokio::test]
    async fn test_init_refuses_existing_lockfile() {
        let store = MemoryFunctionStore::new();
        MetadataManager::new(&store).save_lockfile(&Lockfile::new()).await.unwrap();
        store.clear_operations().await;

        assert!(!init_project(&store, &options("demo", "0.1.0")).await.unwrap());
        assert!(store.operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_init_force_overwrites_and_empties_lockfile() {
        let store = MemoryFunctionStore::new();
        assert!(init_project(&store, &options("demo", "0.1.0")).await.unwrap());

        let mut lockfile = Lockfile::new();
        lockfile.insert("stats", PackageLock::new("1.0.0"));
        MetadataManager::new(&store).save_lockfile(&lockfile).await.unwrap();

        let mut forced = options("fresh", "2.0.0");
        forced.force = true;
        assert!(init_project(&store, &forced).await.unwrap());

        let state = WorkbookState::load(&store).await.unwrap();
        assert_eq!(state.project.unwrap().name, "fresh");
        assert!(state.lockfile.is_empty());
    }

    #[tokio::test]
    async fn test_init_rejects_bad_name() {
        let store = MemoryFunctionStore::new();
        let err = init_project(&store, &options("bad name", "0.1.0")).await.unwrap_err();
        assert!(matches!(err, FormularyError::ConfigValidation { .. }));
        assert!(store.operations().await.is_empty());
    }

    fn authored_state() -> WorkbookState {
        let mut lockfile = Lockfile::new();
        lockfile.insert(
            "stats",
            PackageLock {
                functions: vec!["MEAN".to_string()],
                ..PackageLock::new("1.0.0")
            },
        );
        let functions = [
            FunctionDefinition::new("__GSPROJECT__", "={\"Key\",\"Value\"}"),
            FunctionDefinition::new("MEAN", "=AVERAGE(x)"),
            FunctionDefinition::new("SCORE", "=LAMBDA(x, MEAN(x)*2)").with_argument("x"),
        ]
        .into_iter()
        .map(|f| (f.name.clone(), f))
        .collect();

        WorkbookState {
            project: Some(ProjectMetadata::new("scores", "1.2.0")),
            lockfile,
            functions,
        }
    }

    #[test]
    fn test_package_functions_excludes_installed() {
        let functions = package_functions(&authored_state());
        assert_eq!(functions.keys().collect::<Vec<_>>(), vec!["SCORE"]);
    }

    #[test]
    fn test_pack_writes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = pack_project(&authored_state(), dir.path()).unwrap();

        assert_eq!(outcome.path, dir.path().join("scores-1.2.0.gspkg"));
        assert_eq!(outcome.functions, 1);
        assert!(outcome.bytes > 0);

        let package = extract_archive(&outcome.path).unwrap();
        assert_eq!(package.metadata.name, "scores");
        assert_eq!(package.functions.keys().collect::<Vec<_>>(), vec!["SCORE"]);
        assert!(package.lockfile.is_empty());
    }

    #[test]
    fn test_pack_without_own_functions() {
        let mut state = authored_state();
        state.functions.shift_remove("SCORE");
        let dir = tempfile::tempdir().unwrap();
        let err = pack_project(&state, dir.path()).unwrap_err();
        assert!(matches!(err, FormularyError::NothingToPack { .. }));
    }
}

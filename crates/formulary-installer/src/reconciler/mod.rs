//! Install, upgrade and removal planning
//!
//! Every operation runs the same strictly ordered pipeline and produces a
//! [`Plan`] without touching the function store:
//!
//! 1. merge the request into the project's dependency list
//! 2. resolve registry requirements (local archives are taken as they are)
//! 3. fetch and read every archive, concurrently
//! 4. detect function name collisions, after applying rename maps
//! 5. rewrite the bodies of renamed packages
//! 6. assemble the new lockfile
//! 7. schedule previously owned functions that are gone for deletion
//!
//! Removal skips straight to the ownership closure, see [`plan_removal`].

mod apply;
mod removal;

pub use apply::{apply_plan, ApplySummary};
pub use removal::{dependency_closure, plan_removal};

use formulary_cache::{extract_archive, extract_archive_bytes, ArtifactCache, ExtractedPackage};
use formulary_core::error::FormularyError;
use formulary_core::utils::verify_integrity;
use formulary_core::types::{
    is_reserved, Dependency, FunctionDefinition, Lockfile, PackageLock, ProjectMetadata, Version,
    LOCAL_VERSION,
};
use formulary_formula::{refactor, RenameMap};
use formulary_registry::{Registry, RegistryIndex};
use formulary_resolver::{IndexProvider, Resolver, DEFAULT_MAX_ROUNDS};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::metadata::decode_workbook;
use crate::store::FunctionStore;
use crate::InstallerResult;

/// Project name used when installing into a workbook without metadata
pub const DEFAULT_PROJECT_NAME: &str = "my-project";
/// Project version used when installing into a workbook without metadata
pub const DEFAULT_PROJECT_VERSION: &str = "0.1.0";

/// Per package function aliases: `{package: {old_name: new_name}}`
pub type RenameMaps = HashMap<String, RenameMap>;

/// What the user asked to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallTarget {
    /// A requirement string such as `stats>=1.0`
    Requirement(String),
    /// A package archive on disk
    Local(PathBuf),
}

impl InstallTarget {
    /// Interpret a command line argument
    pub fn from_arg(arg: &str, local: bool) -> Self {
        if local {
            Self::Local(PathBuf::from(arg))
        } else {
            Self::Requirement(arg.to_string())
        }
    }
}

/// Snapshot of a workbook taken before planning
#[derive(Debug, Clone, Default)]
pub struct WorkbookState {
    /// `None` when the workbook has no `__GSPROJECT__`
    pub project: Option<ProjectMetadata>,
    /// Empty when the workbook has no `__LOCK__`
    pub lockfile: Lockfile,
    /// Every named function, reserved ones included
    pub functions: IndexMap<String, FunctionDefinition>,
}

impl WorkbookState {
    /// Read the workbook with a single store call
    pub async fn load<S: FunctionStore>(store: &S) -> InstallerResult<Self> {
        let functions = store.get_named_functions().await?;
        let (project, lockfile) = decode_workbook(&functions);
        Ok(Self {
            project,
            lockfile: lockfile.unwrap_or_default(),
            functions,
        })
    }

    /// Project metadata, or `NoProject`
    pub fn project(&self) -> InstallerResult<&ProjectMetadata> {
        self.project.as_ref().ok_or(FormularyError::NoProject)
    }
}

/// The validated target state of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Project metadata with the updated dependency list
    pub project: ProjectMetadata,
    /// Package functions to create or update, keyed by final name
    pub functions: IndexMap<String, FunctionDefinition>,
    /// Replaces the previous lockfile
    pub lockfile: Lockfile,
    /// Previously owned functions that no package provides any more
    pub functions_to_delete: Vec<String>,
    /// Locked packages absent from the new lockfile
    pub removed_packages: Vec<String>,
}

/// Result of an upgrade
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeOutcome {
    /// `{package: (old_version, new_version)}`
    pub upgrades: IndexMap<String, (String, String)>,
    /// `None` when everything is up to date
    pub plan: Option<Plan>,
}

/// A package checked out for development
#[derive(Debug, Clone, PartialEq)]
pub struct DevelopOutcome {
    pub package: String,
    /// Index version key that was checked out
    pub version: String,
    /// The package's own functions, written without an owner
    pub sources: Vec<String>,
    /// Dependencies, sources and the adopted project metadata
    pub plan: Plan,
}

enum Source {
    Local {
        path: PathBuf,
        package: ExtractedPackage,
    },
    /// Version as written in the registry index
    Registry { version: String },
}

/// A package chosen for installation
struct Selected {
    name: String,
    source: Source,
}

/// A package whose archive has been read
#[derive(Debug, Clone)]
struct Materialized {
    name: String,
    version: String,
    resolved: String,
    integrity: String,
    dependencies: Vec<String>,
    functions: IndexMap<String, FunctionDefinition>,
}

impl Materialized {
    fn new(name: String, version: String, resolved: String, package: ExtractedPackage) -> Self {
        let mut functions = package.functions;
        functions.retain(|function, _| {
            let keep = !is_reserved(function);
            if !keep {
                warn!(package = %name, function = %function, "ignoring reserved function in archive");
            }
            keep
        });
        Self {
            name,
            version,
            resolved,
            integrity: package.integrity,
            dependencies: package.metadata.dependencies,
            functions,
        }
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Run filesystem and zip work off the async workers
async fn blocking<T, F>(task: F) -> InstallerResult<T>
where
    F: FnOnce() -> InstallerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        FormularyError::io(
            "Blocking task failed".to_string(),
            std::io::Error::new(std::io::ErrorKind::Other, e),
        )
    })?
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Read a local archive named by a dependency or the command line
async fn read_local(path: &Path) -> InstallerResult<ExtractedPackage> {
    if !is_file(path).await {
        return Err(FormularyError::LocalPackageMissing {
            path: path_text(path),
        });
    }
    let path = path.to_path_buf();
    blocking(move || extract_archive(&path)).await
}

/// Plans operations against a registry and an artifact cache
pub struct Reconciler<R: Registry> {
    registry: Arc<R>,
    artifacts: Arc<ArtifactCache>,
    max_rounds: usize,
}

impl<R: Registry + 'static> Reconciler<R> {
    /// Create a reconciler
    pub fn new(registry: Arc<R>, artifacts: Arc<ArtifactCache>) -> Self {
        Self {
            registry,
            artifacts,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Limit the resolver search
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// The registry packages come from
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Plan installing `targets` on top of the project's dependencies.
    ///
    /// Each target replaces any existing entry for the same package name.
    /// A workbook without metadata gets a default project.
    pub async fn install(
        &self,
        state: &WorkbookState,
        targets: &[InstallTarget],
        renames: &RenameMaps,
    ) -> InstallerResult<Plan> {
        let mut project = state.project.clone().unwrap_or_else(|| {
            ProjectMetadata::new(DEFAULT_PROJECT_NAME, DEFAULT_PROJECT_VERSION)
        });

        for target in targets {
            let dependency = self.desired_dependency(target).await?;
            debug!(dependency = %dependency, "adding dependency");
            project.upsert_dependency(&dependency);
        }

        let selected = self.select(&project, &[]).await?;
        self.finish(state, project, selected, renames).await
    }

    /// Plan upgrading `targets` (every locked package when empty) to the
    /// newest versions the project's specifiers allow.
    ///
    /// Locked packages outside the targets and their dependencies stay at
    /// their current version.
    pub async fn upgrade(
        &self,
        state: &WorkbookState,
        targets: &[String],
        renames: &RenameMaps,
    ) -> InstallerResult<UpgradeOutcome> {
        let project = state.project()?.clone();

        let targets: Vec<String> = if targets.is_empty() {
            state.lockfile.packages.keys().cloned().collect()
        } else {
            for target in targets {
                if !state.lockfile.contains(target) {
                    return Err(FormularyError::NotInstalled {
                        name: target.clone(),
                    });
                }
            }
            targets.to_vec()
        };

        let movable = dependency_closure(&state.lockfile, targets);
        let pins: Vec<Dependency> = state
            .lockfile
            .packages
            .iter()
            .filter(|(name, entry)| !movable.contains(name.as_str()) && !entry.is_local())
            .filter_map(|(name, entry)| {
                let version = entry.version.parse::<Version>().ok()?;
                Some(Dependency::new(name.clone(), format!("=={}", version)))
            })
            .collect();
        debug!(pinned = pins.len(), movable = movable.len(), "planning upgrade");

        let selected = self.select(&project, &pins).await?;

        let mut upgrades = IndexMap::new();
        for selection in &selected {
            let Source::Registry { version } = &selection.source else {
                continue;
            };
            let Some(entry) = state.lockfile.get(&selection.name) else {
                continue;
            };
            if entry.is_local() || same_version(&entry.version, version) {
                continue;
            }
            upgrades.insert(selection.name.clone(), (entry.version.clone(), version.clone()));
        }

        if upgrades.is_empty() {
            info!("all packages are up to date");
            return Ok(UpgradeOutcome {
                upgrades,
                plan: None,
            });
        }

        let plan = self.finish(state, project, selected, renames).await?;
        Ok(UpgradeOutcome {
            upgrades,
            plan: Some(plan),
        })
    }

    /// Plan removing `targets`; see [`plan_removal`]
    pub fn remove(&self, state: &WorkbookState, targets: &[String]) -> InstallerResult<Plan> {
        plan_removal(state, targets)
    }

    /// Plan a development workbook for `package` at `version`, the latest
    /// when `None`.
    ///
    /// The package's dependencies are resolved, installed and locked like any
    /// install. Its own functions are written as project source, owned by no
    /// package, and its metadata becomes the project metadata. A workbook that
    /// already has a project is refused.
    pub async fn develop(
        &self,
        state: &WorkbookState,
        package: &str,
        version: Option<&str>,
    ) -> InstallerResult<DevelopOutcome> {
        if let Some(project) = &state.project {
            return Err(FormularyError::ProjectExists {
                name: project.name.clone(),
            });
        }

        let index = self.registry.index().await?;
        let version = checkout_version(&index, package, version)?;
        info!(package, version = %version, "preparing development workbook");

        let checkout = fetch_package(
            Arc::clone(&self.registry),
            Arc::clone(&self.artifacts),
            package,
            &version,
            None,
        )
        .await?;

        let project = checkout.metadata;
        let selected = self.select(&project, &[]).await?;
        let mut plan = self.finish(state, project, selected, &RenameMaps::new()).await?;

        let mut sources = Vec::new();
        let mut conflicts = Vec::new();
        for (name, function) in checkout.functions {
            if is_reserved(&name) {
                warn!(package, function = %name, "ignoring reserved function in archive");
                continue;
            }
            if plan.functions.contains_key(&name) || state.functions.contains_key(&name) {
                conflicts.push(name);
                continue;
            }
            sources.push(name.clone());
            plan.functions.insert(name, function);
        }

        if !conflicts.is_empty() {
            warn!(package, conflicts = ?conflicts, "source functions collide");
            return Err(FormularyError::FunctionCollision {
                package: package.to_string(),
                conflicts,
            });
        }

        Ok(DevelopOutcome {
            package: package.to_string(),
            version,
            sources,
            plan,
        })
    }

    async fn desired_dependency(&self, target: &InstallTarget) -> InstallerResult<Dependency> {
        match target {
            InstallTarget::Requirement(requirement) => Dependency::parse(requirement),
            InstallTarget::Local(path) => {
                if !is_file(path).await {
                    return Err(FormularyError::LocalPackageMissing {
                        path: path_text(path),
                    });
                }
                let absolute = tokio::fs::canonicalize(path).await.map_err(|e| {
                    FormularyError::io(format!("Failed to resolve {}", path.display()), e)
                })?;
                let package = read_local(&absolute).await?;
                let name = package.metadata.name;
                if !formulary_core::Package::is_valid_name(&name) {
                    return Err(FormularyError::ArchiveCorrupt {
                        path: path_text(&absolute),
                        reason: format!("invalid package name '{}'", name),
                    });
                }
                Ok(Dependency::local(name, &path_text(&absolute)))
            },
        }
    }

    /// Phases 1 and 2: split local from registry dependencies and resolve
    async fn select(
        &self,
        project: &ProjectMetadata,
        pins: &[Dependency],
    ) -> InstallerResult<Vec<Selected>> {
        let mut selected = Vec::new();
        let mut requirements = Vec::new();

        for dependency in project.parsed_dependencies()? {
            match dependency.local_path() {
                Some(path) => {
                    let path = PathBuf::from(path);
                    let package = read_local(&path).await?;
                    for requirement in &package.metadata.dependencies {
                        requirements.push(Dependency::parse(requirement)?);
                    }
                    selected.push(Selected {
                        name: dependency.name.clone(),
                        source: Source::Local { path, package },
                    });
                },
                None => requirements.push(dependency),
            }
        }

        let local_names: HashSet<String> = selected.iter().map(|s| s.name.clone()).collect();
        requirements.extend(pins.iter().cloned());
        requirements.retain(|r| !local_names.contains(&r.name));

        if requirements.is_empty() {
            return Ok(selected);
        }

        let index = self.registry.index().await?;
        let resolved = resolve_registry(&index, &requirements, self.max_rounds)?;
        for (name, version) in resolved {
            if local_names.contains(&name) {
                debug!(package = %name, "local archive shadows registry package");
                continue;
            }
            selected.push(Selected {
                name,
                source: Source::Registry { version },
            });
        }
        Ok(selected)
    }

    /// Phases 3 to 7
    async fn finish(
        &self,
        state: &WorkbookState,
        project: ProjectMetadata,
        selected: Vec<Selected>,
        renames: &RenameMaps,
    ) -> InstallerResult<Plan> {
        let packages = self.materialize(selected, &state.lockfile).await?;
        let packages = detect_collisions(state, packages, renames)?;
        let packages = rewrite(packages, renames);
        Ok(assemble(state, project, packages))
    }

    /// Phase 3: fetch every archive; any failure aborts the rest.
    ///
    /// Packages locked at the same registry version must still match their
    /// recorded integrity.
    async fn materialize(
        &self,
        selected: Vec<Selected>,
        previous: &Lockfile,
    ) -> InstallerResult<Vec<Materialized>> {
        let mut slots: Vec<Option<Materialized>> = Vec::with_capacity(selected.len());
        let mut fetches = JoinSet::new();

        for (slot, selection) in selected.into_iter().enumerate() {
            match selection.source {
                Source::Local { path, package } => {
                    let resolved = PackageLock::file_origin(&path_text(&path));
                    slots.push(Some(Materialized::new(
                        selection.name,
                        LOCAL_VERSION.to_string(),
                        resolved,
                        package,
                    )));
                },
                Source::Registry { version } => {
                    slots.push(None);
                    let registry = Arc::clone(&self.registry);
                    let artifacts = Arc::clone(&self.artifacts);
                    let expected = locked_integrity(previous, &selection.name, &version);
                    let name = selection.name;
                    fetches.spawn(async move {
                        let result = fetch_package(registry, artifacts, &name, &version, expected)
                            .await
                            .map(|package| {
                                let resolved = PackageLock::registry_origin(&name, &version);
                                Materialized::new(name, version, resolved, package)
                            });
                        (slot, result)
                    });
                },
            }
        }

        while let Some(joined) = fetches.join_next().await {
            let (slot, result) = joined.map_err(|e| {
                FormularyError::io(
                    "Package fetch task failed".to_string(),
                    std::io::Error::new(std::io::ErrorKind::Other, e),
                )
            })?;
            match result {
                Ok(package) => slots[slot] = Some(package),
                Err(e) => {
                    fetches.abort_all();
                    return Err(e);
                },
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// Index key of the requested version, or of the latest one
fn checkout_version(
    index: &RegistryIndex,
    name: &str,
    requested: Option<&str>,
) -> InstallerResult<String> {
    if index.package(name).is_none() {
        return Err(FormularyError::PackageNotFound {
            name: name.to_string(),
        });
    }
    let version = match requested {
        Some(text) => text.parse::<Version>()?,
        None => index
            .latest_version(name)
            .ok_or_else(|| FormularyError::PackageNotFound {
                name: name.to_string(),
            })?,
    };
    index
        .version_key(name, &version)
        .map(str::to_string)
        .ok_or_else(|| FormularyError::VersionNotFound {
            name: name.to_string(),
            version: version.to_string(),
        })
}

fn same_version(locked: &str, selected: &str) -> bool {
    match (locked.parse::<Version>(), selected.parse::<Version>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => locked == selected,
    }
}

/// Resolve registry requirements to `(name, index version key)` pairs
fn resolve_registry(
    index: &RegistryIndex,
    requirements: &[Dependency],
    max_rounds: usize,
) -> InstallerResult<Vec<(String, String)>> {
    let resolver = Resolver::new(IndexProvider::new(index)).with_max_rounds(max_rounds);
    let result = resolver.resolve_with_stats(requirements)?;
    info!(
        packages = result.packages.len(),
        rounds = result.rounds,
        backtracks = result.backtracks,
        elapsed_ms = result.resolution_time_ms,
        "resolved dependencies"
    );

    Ok(result
        .packages
        .into_iter()
        .map(|package| {
            let version = index
                .version_key(&package.name, &package.version)
                .map(str::to_string)
                .unwrap_or_else(|| package.version.to_string());
            (package.name, version)
        })
        .collect())
}

/// Integrity recorded for `name` when it is locked at `version` from the registry
fn locked_integrity(previous: &Lockfile, name: &str, version: &str) -> Option<String> {
    previous
        .get(name)
        .filter(|entry| !entry.is_local() && same_version(&entry.version, version))
        .and_then(|entry| entry.integrity.clone())
        .filter(|integrity| !integrity.is_empty())
}

/// Archive of `name` at `version`, from the artifact cache or the registry.
///
/// Downloads are stored in the cache before they are read.
async fn fetch_package<R: Registry>(
    registry: Arc<R>,
    artifacts: Arc<ArtifactCache>,
    name: &str,
    version: &str,
    expected: Option<String>,
) -> InstallerResult<ExtractedPackage> {
    let data = if artifacts.has_artifact(name, version) {
        debug!(package = %name, version = %version, "artifact cache hit");
        let path = artifacts.artifact_path(name, version)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| FormularyError::io(format!("Failed to read {}", path), e))?
    } else {
        info!(package = %name, version = %version, "downloading");
        let data = registry.fetch_archive(name, version).await?;
        let (package, release) = (name.to_string(), version.to_string());
        blocking(move || {
            artifacts.store(&package, &release, &data)?;
            Ok(data)
        })
        .await?
    };

    if let Some(expected) = expected {
        verify_integrity(name, &data, &expected)?;
    }

    let label = format!("{}-{}.gspkg", name, version);
    blocking(move || extract_archive_bytes(&data, &label)).await
}

/// Phase 4: apply rename maps to function names, then collect conflicts.
///
/// A name conflicts when the workbook already has it and the lockfile does
/// not record this package as its owner, or when another package of the
/// same batch introduces it. The first package with conflicts fails the
/// whole batch, listing all of its conflicts.
fn detect_collisions(
    state: &WorkbookState,
    packages: Vec<Materialized>,
    renames: &RenameMaps,
) -> InstallerResult<Vec<Materialized>> {
    let owners = state.lockfile.ownership_map();
    let mut introduced: HashMap<String, String> = HashMap::new();
    let mut checked = Vec::with_capacity(packages.len());

    for mut package in packages {
        let mut conflicts = Vec::new();

        if let Some(map) = renames.get(&package.name).filter(|m| !m.is_empty()) {
            let mut renamed = IndexMap::with_capacity(package.functions.len());
            for (name, function) in package.functions {
                let alias = map.get(&name).cloned().unwrap_or(name);
                if renamed.insert(alias.clone(), function).is_some() {
                    conflicts.push(alias);
                }
            }
            package.functions = renamed;
        }

        for name in package.functions.keys() {
            let taken_in_workbook = state.functions.contains_key(name)
                && owners.get(name.as_str()).copied() != Some(package.name.as_str());
            let taken_in_batch = introduced
                .get(name)
                .map_or(false, |owner| *owner != package.name);
            if (taken_in_workbook || taken_in_batch) && !conflicts.contains(name) {
                conflicts.push(name.clone());
            }
        }

        if !conflicts.is_empty() {
            warn!(package = %package.name, conflicts = ?conflicts, "function collision");
            return Err(FormularyError::FunctionCollision {
                package: package.name,
                conflicts,
            });
        }

        for name in package.functions.keys() {
            introduced.insert(name.clone(), package.name.clone());
        }
        checked.push(package);
    }

    Ok(checked)
}

/// Phase 5: rewrite the bodies of packages with a rename map
fn rewrite(packages: Vec<Materialized>, renames: &RenameMaps) -> Vec<Materialized> {
    packages
        .into_iter()
        .map(|mut package| {
            if let Some(map) = renames.get(&package.name).filter(|m| !m.is_empty()) {
                let functions: Vec<(String, FunctionDefinition)> =
                    std::mem::take(&mut package.functions).into_iter().collect();
                let rewritten: Vec<(String, FunctionDefinition)> = functions
                    .into_par_iter()
                    .map(|(name, mut function)| {
                        function.definition = refactor(&function.definition, map);
                        function.name = name.clone();
                        (name, function)
                    })
                    .collect();
                debug!(package = %package.name, functions = rewritten.len(), "rewrote renamed package");
                package.functions = rewritten.into_iter().collect();
            }
            package
        })
        .collect()
}

/// Phases 6 and 7: the new lockfile and the functions to delete
fn assemble(state: &WorkbookState, project: ProjectMetadata, packages: Vec<Materialized>) -> Plan {
    let mut lockfile = Lockfile::new();
    let mut functions = IndexMap::new();

    for package in packages {
        let entry = PackageLock {
            version: package.version,
            resolved: Some(package.resolved),
            integrity: Some(package.integrity),
            dependencies: package.dependencies,
            functions: package.functions.keys().cloned().collect(),
        };
        lockfile.insert(package.name, entry);
        functions.extend(package.functions);
    }

    let mut functions_to_delete: Vec<String> = Vec::new();
    for name in state.lockfile.owned_functions() {
        if !functions.contains_key(name) && !functions_to_delete.iter().any(|f| f == name) {
            functions_to_delete.push(name.to_string());
        }
    }

    let removed_packages = state
        .lockfile
        .packages
        .keys()
        .filter(|name| !lockfile.contains(name))
        .cloned()
        .collect();

    Plan {
        project,
        functions,
        lockfile,
        functions_to_delete,
        removed_packages,
    }
}

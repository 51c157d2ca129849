//! Unit tests for CLI commands.

use super::aliases::{is_valid_alias, parse_rename, rename_maps, retry_with_aliases, AliasSource, NoPrompt};
use super::*;
use formulary_cache::build_archive;
use formulary_core::types::{FunctionDefinition, ProjectMetadata};
use formulary_installer::{FunctionStore, RenameMaps, WorkbookState};
use indexmap::IndexMap;
use tempfile::TempDir;

/// Answers prompts from a fixed list
struct Scripted(Vec<&'static str>);

impl AliasSource for Scripted {
    fn alias(&mut self, _package: &str, _function: &str) -> FormularyResult<Option<String>> {
        if self.0.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.0.remove(0).to_string()))
    }
}

fn collision(conflicts: &[&str]) -> FormularyError {
    FormularyError::FunctionCollision {
        package: "P".to_string(),
        conflicts: conflicts.iter().map(|c| c.to_string()).collect(),
    }
}

/// A registry directory publishing `stats` 1.0.0 and 1.1.0
fn create_registry(dir: &TempDir) -> std::path::PathBuf {
    let root = dir.path().join("registry");
    std::fs::create_dir_all(root.join("archives")).unwrap();

    for (version, body) in [("1.0.0", "=AVERAGE(x)"), ("1.1.0", "=SUM(x)/COUNT(x)")] {
        let metadata = ProjectMetadata::new("stats", version);
        let mut functions = IndexMap::new();
        functions.insert(
            "MEAN".to_string(),
            FunctionDefinition::new("MEAN", body).with_argument("x"),
        );
        let data = build_archive(&metadata, &functions, None).unwrap();
        std::fs::write(root.join(format!("archives/stats-{}.gspkg", version)), data).unwrap();
    }

    std::fs::write(
        root.join("index.json"),
        br#"{"stats": {"description": "Statistics helpers", "versions": {
            "1.0.0": {"path": "archives/stats-1.0.0.gspkg"}
        }}}"#,
    )
    .unwrap();
    root
}

fn publish_stats_1_1(registry: &std::path::Path) {
    std::fs::write(
        registry.join("index.json"),
        br#"{"stats": {"description": "Statistics helpers", "versions": {
            "1.0.0": {"path": "archives/stats-1.0.0.gspkg"},
            "1.1.0": {"path": "archives/stats-1.1.0.gspkg"}
        }}}"#,
    )
    .unwrap();
}

fn init_options(version: &str) -> InitOptions {
    InitOptions {
        version: version.to_string(),
        ..InitOptions::default()
    }
}

/// Create a test command context in a temporary directory
fn create_test_context(dir: &TempDir, registry: &std::path::Path) -> CommandContext {
    let home = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let mut config = Config::defaults(&home);
    config.registry_url = registry.to_string_lossy().into_owned();
    config.workbook = Some(Utf8PathBuf::from("book.json"));
    CommandContext {
        cwd: home,
        config,
        output: crate::output::OutputHandler::new(),
        interactive: false,
    }
}

#[test]
fn test_parse_rename() {
    assert_eq!(
        parse_rename("stats:MEAN=STATS.MEAN").unwrap(),
        ("stats".to_string(), "MEAN".to_string(), "STATS.MEAN".to_string())
    );
    assert!(parse_rename("stats").is_err());
    assert!(parse_rename("stats:MEAN").is_err());
    assert!(parse_rename(":MEAN=X").is_err());
    assert!(parse_rename("stats:MEAN=1X").is_err());
    assert!(parse_rename("stats:MEAN=__LOCK__").is_err());
}

#[test]
fn test_rename_maps_group_by_package() {
    let maps = rename_maps(&[
        "a:F=A_F".to_string(),
        "a:G=A_G".to_string(),
        "b:F=B_F".to_string(),
    ])
    .unwrap();
    assert_eq!(maps["a"].len(), 2);
    assert_eq!(maps["b"]["F"], "B_F");
}

#[test]
fn test_alias_validation() {
    assert!(is_valid_alias("MY_FN"));
    assert!(is_valid_alias("_private.v2"));
    assert!(!is_valid_alias(""));
    assert!(!is_valid_alias("2FN"));
    assert!(!is_valid_alias("MY FN"));
    assert!(!is_valid_alias("__GSPROJECT__"));
}

#[tokio::test]
async fn test_retry_collects_aliases_until_success() {
    let mut renames = RenameMaps::new();
    let mut attempts: Vec<RenameMaps> = Vec::new();

    let result = retry_with_aliases(&mut renames, &mut Scripted(vec!["P_F", "P_G"]), |maps| {
        attempts.push(maps.clone());
        let outcome = match attempts.len() {
            1 => Err(collision(&["F", "G"])),
            _ => Ok(maps),
        };
        async move { outcome }
    })
    .await
    .unwrap();

    assert_eq!(attempts.len(), 2);
    assert_eq!(result["P"]["F"], "P_F");
    assert_eq!(result["P"]["G"], "P_G");
    assert_eq!(renames, result);
}

#[tokio::test]
async fn test_retry_replaces_conflicting_alias() {
    let mut renames = RenameMaps::new();
    renames.insert(
        "P".to_string(),
        [("F".to_string(), "TAKEN".to_string())].into_iter().collect(),
    );
    let mut calls = 0;

    let result = retry_with_aliases(&mut renames, &mut Scripted(vec!["FREE"]), |maps| {
        calls += 1;
        let outcome = if calls == 1 {
            Err(collision(&["TAKEN"]))
        } else {
            Ok(maps)
        };
        async move { outcome }
    })
    .await
    .unwrap();

    assert_eq!(result["P"].len(), 1);
    assert_eq!(result["P"]["F"], "FREE");
}

#[tokio::test]
async fn test_retry_without_aliases_reports_collision() {
    let mut renames = RenameMaps::new();
    let err = retry_with_aliases(&mut renames, &mut NoPrompt, |_| async {
        Err::<(), _>(collision(&["F"]))
    })
    .await
    .unwrap_err();
    assert!(matches!(err, FormularyError::FunctionCollision { .. }));
}

#[tokio::test]
async fn test_init_install_upgrade_remove() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_registry(&dir);
    let ctx = create_test_context(&dir, &registry);

    init::execute(Some("demo".to_string()), init_options("0.1.0"), &ctx)
        .await
        .unwrap();
    assert!(dir.path().join("book.json").exists());

    install::execute(vec!["stats>=1.0".to_string()], false, Vec::new(), &ctx)
        .await
        .unwrap();
    let state = WorkbookState::load(&ctx.workbook()).await.unwrap();
    assert_eq!(state.lockfile.get("stats").unwrap().version, "1.0.0");
    assert_eq!(state.functions["MEAN"].definition, "=AVERAGE(x)");
    assert_eq!(state.project.unwrap().dependencies, vec!["stats>=1.0".to_string()]);

    info::execute(None, None, &ctx).await.unwrap();
    info::execute(Some("stats".to_string()), None, &ctx).await.unwrap();
    info::execute(Some("stats".to_string()), Some("1.0".to_string()), &ctx)
        .await
        .unwrap();

    publish_stats_1_1(&registry);
    upgrade::execute(Vec::new(), Vec::new(), &ctx).await.unwrap();
    let state = WorkbookState::load(&ctx.workbook()).await.unwrap();
    assert_eq!(state.lockfile.get("stats").unwrap().version, "1.1.0");
    assert_eq!(state.functions["MEAN"].definition, "=SUM(x)/COUNT(x)");

    remove::execute(vec!["stats".to_string()], &ctx).await.unwrap();
    let state = WorkbookState::load(&ctx.workbook()).await.unwrap();
    assert!(state.lockfile.is_empty());
    assert!(!state.functions.contains_key("MEAN"));
}

#[tokio::test]
async fn test_install_collision_without_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_registry(&dir);
    let ctx = create_test_context(&dir, &registry);

    ctx.workbook()
        .create_function(&FunctionDefinition::new("MEAN", "=\"mine\""))
        .await
        .unwrap();

    let err = install::execute(vec!["stats".to_string()], false, Vec::new(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, FormularyError::FunctionCollision { .. }));

    install::execute(
        vec!["stats".to_string()],
        false,
        vec!["stats:MEAN=STATS.MEAN".to_string()],
        &ctx,
    )
    .await
    .unwrap();
    let state = WorkbookState::load(&ctx.workbook()).await.unwrap();
    assert_eq!(state.functions["MEAN"].definition, "=\"mine\"");
    assert_eq!(state.functions["STATS.MEAN"].definition, "=AVERAGE(x)");
}

#[tokio::test]
async fn test_install_without_targets_needs_project() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_registry(&dir);
    let ctx = create_test_context(&dir, &registry);

    let err = install::execute(Vec::new(), false, Vec::new(), &ctx).await.unwrap_err();
    assert!(matches!(err, FormularyError::NoProject));
}

#[tokio::test]
async fn test_info_unknown_package() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_registry(&dir);
    let ctx = create_test_context(&dir, &registry);

    let err = info::execute(Some("ghost".to_string()), None, &ctx).await.unwrap_err();
    assert!(matches!(err, FormularyError::PackageNotFound { .. }));

    let err = info::execute(Some("stats".to_string()), Some("9.9.9".to_string()), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, FormularyError::VersionNotFound { .. }));
}

#[tokio::test]
async fn test_pack_writes_archive_in_cwd() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_registry(&dir);
    let ctx = create_test_context(&dir, &registry);

    init::execute(Some("mine".to_string()), init_options("2.0.0"), &ctx)
        .await
        .unwrap();
    ctx.workbook()
        .create_function(&FunctionDefinition::new("DOUBLE", "=LAMBDA(x, x*2)"))
        .await
        .unwrap();

    pack::execute(std::path::PathBuf::from("dist"), &ctx).await.unwrap();
    assert!(dir.path().join("dist/mine-2.0.0.gspkg").is_file());
}

#[tokio::test]
async fn test_cache_clear_and_info() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_registry(&dir);
    let ctx = create_test_context(&dir, &registry);

    install::execute(vec!["stats".to_string()], false, Vec::new(), &ctx)
        .await
        .unwrap();
    assert_eq!(ctx.artifacts().unwrap().stats().unwrap().artifacts, 1);

    cache::execute(crate::CacheAction::Info, &ctx).await.unwrap();
    cache::execute(crate::CacheAction::Update, &ctx).await.unwrap();

    let clear = |target| crate::CacheAction::Clear { target };
    cache::execute(clear(crate::ClearTarget::Index), &ctx).await.unwrap();
    assert_eq!(ctx.artifacts().unwrap().stats().unwrap().artifacts, 1);
    cache::execute(clear(crate::ClearTarget::Packages), &ctx).await.unwrap();
    assert_eq!(ctx.artifacts().unwrap().stats().unwrap().artifacts, 0);
    cache::execute(clear(crate::ClearTarget::All), &ctx).await.unwrap();
}

#[tokio::test]
async fn test_init_force_replaces_project() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_registry(&dir);
    let ctx = create_test_context(&dir, &registry);

    init::execute(Some("demo".to_string()), init_options("0.1.0"), &ctx)
        .await
        .unwrap();
    install::execute(vec!["stats".to_string()], false, Vec::new(), &ctx)
        .await
        .unwrap();

    init::execute(Some("other".to_string()), init_options("1.0.0"), &ctx)
        .await
        .unwrap();
    let state = WorkbookState::load(&ctx.workbook()).await.unwrap();
    assert_eq!(state.project.unwrap().name, "demo");

    let mut forced = init_options("1.0.0");
    forced.force = true;
    forced.license = Some("MIT".to_string());
    init::execute(Some("other".to_string()), forced, &ctx).await.unwrap();
    let state = WorkbookState::load(&ctx.workbook()).await.unwrap();
    let project = state.project.unwrap();
    assert_eq!(project.name, "other");
    assert_eq!(project.extra_str("license"), Some("MIT"));
    assert!(state.lockfile.is_empty());
    info::execute(None, None, &ctx).await.unwrap();
}

#[tokio::test]
async fn test_dev_checks_out_package() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_registry(&dir);
    publish_stats_1_1(&registry);
    let ctx = create_test_context(&dir, &registry);

    dev::execute("stats".to_string(), Some("1.0.0".to_string()), &ctx)
        .await
        .unwrap();
    let state = WorkbookState::load(&ctx.workbook()).await.unwrap();
    let project = state.project.unwrap();
    assert_eq!(project.name, "stats");
    assert_eq!(project.version, "1.0.0");
    assert_eq!(state.functions["MEAN"].definition, "=AVERAGE(x)");
    assert!(state.lockfile.is_empty());

    let err = dev::execute("stats".to_string(), None, &ctx).await.unwrap_err();
    assert!(matches!(err, FormularyError::ProjectExists { .. }));
}

#[test]
fn test_sorted_versions_newest_first() {
    let entry = entry_with_versions();
    let keys: Vec<&str> = info::sorted_versions(&entry).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["1.10.0", "1.2.0", "1.0.0-beta", "nightly"]);
}

fn entry_with_versions() -> formulary_registry::PackageEntry {
    let mut entry = formulary_registry::PackageEntry::default();
    for key in ["1.2.0", "nightly", "1.0.0-beta", "1.10.0"] {
        entry.versions.insert(key.to_string(), Default::default());
    }
    entry
}

//! Unit tests for the backtracking resolver

use super::*;
use crate::provider::IndexProvider;
use formulary_core::types::Version;
use formulary_registry::{PackageIndex, RegistryIndex, RegistryResult, VersionMetadata};
use std::cell::RefCell;

fn index(json: &str) -> RegistryIndex {
    RegistryIndex::from_json(json.as_bytes()).unwrap()
}

fn deps(list: &[&str]) -> Vec<Dependency> {
    list.iter().map(|d| Dependency::parse(d).unwrap()).collect()
}

fn pinned(packages: &[Package]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = packages
        .iter()
        .map(|p| (p.name.clone(), p.version.to_string()))
        .collect();
    pairs.sort();
    pairs
}

fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect()
}

#[test]
fn test_newest_compatible_preferred() {
    let index = index(
        r#"{
            "pkg-a": {"versions": {"1.0.0": {}, "2.0.0": {}}},
            "pkg-b": {"versions": {"1.0.0": {"dependencies": ["pkg-a>=1.0.0"]}}}
        }"#,
    );
    let resolver = Resolver::new(IndexProvider::new(&index));
    let packages = resolver.resolve(&deps(&["pkg-b"])).unwrap();

    assert_eq!(pinned(&packages), pairs(&[("pkg-a", "2.0.0"), ("pkg-b", "1.0.0")]));
    let b = packages.iter().find(|p| p.name == "pkg-b").unwrap();
    assert_eq!(b.dependencies, vec!["pkg-a>=1.0.0".to_string()]);
}

#[test]
fn test_nonexistent_package_is_unsatisfiable() {
    let index = index(r#"{"pkg-a": {"versions": {"1.0.0": {}}}}"#);
    let resolver = Resolver::new(IndexProvider::new(&index));
    let err = resolver.resolve(&deps(&["pkg-a", "missing"])).unwrap_err();

    match &err {
        FormularyError::UnsatisfiableRequirements { requirements } => {
            assert_eq!(requirements, &deps(&["missing"]));
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "Could not satisfy requirements: missing");
}

#[test]
fn test_unsatisfiable_specifier_reports_requirements() {
    let index = index(r#"{"pkg-a": {"versions": {"1.0.0": {}}}}"#);
    let resolver = Resolver::new(IndexProvider::new(&index));
    let err = resolver.resolve(&deps(&["pkg-a>=2.0.0"])).unwrap_err();
    assert_eq!(err.to_string(), "Could not satisfy requirements: pkg-a>=2.0.0");
}

#[test]
fn test_backtracks_to_older_candidate() {
    let index = index(
        r#"{
            "a": {"versions": {
                "1.0.0": {"dependencies": ["c==1.0.0"]},
                "2.0.0": {"dependencies": ["c==2.0.0"]}
            }},
            "b": {"versions": {"1.0.0": {"dependencies": ["c<2"]}}},
            "c": {"versions": {"1.0.0": {}, "2.0.0": {}}}
        }"#,
    );
    let resolver = Resolver::new(IndexProvider::new(&index));
    let result = resolver.resolve_with_stats(&deps(&["a", "b"])).unwrap();

    assert_eq!(
        pinned(&result.packages),
        pairs(&[("a", "1.0.0"), ("b", "1.0.0"), ("c", "1.0.0")])
    );
    assert!(result.backtracks >= 1);
}

#[test]
fn test_backtracks_across_levels() {
    // a 2.0.0 pulls in b, whose requirement on c contradicts a's own
    let index = index(
        r#"{
            "a": {"versions": {
                "1.0.0": {},
                "2.0.0": {"dependencies": ["b", "c==1.0.0"]}
            }},
            "b": {"versions": {"1.0.0": {"dependencies": ["c>=2"]}}},
            "c": {"versions": {"1.0.0": {}, "2.0.0": {}}}
        }"#,
    );
    let resolver = Resolver::new(IndexProvider::new(&index));
    let packages = resolver.resolve(&deps(&["a"])).unwrap();
    assert_eq!(pinned(&packages), pairs(&[("a", "1.0.0")]));
}

#[test]
fn test_exhausted_search_names_conflict() {
    let index = index(
        r#"{
            "a": {"versions": {"1.0.0": {"dependencies": ["c==1.0.0"]}}},
            "b": {"versions": {"1.0.0": {"dependencies": ["c==2.0.0"]}}},
            "c": {"versions": {"1.0.0": {}, "2.0.0": {}}}
        }"#,
    );
    let resolver = Resolver::new(IndexProvider::new(&index));
    let err = resolver.resolve(&deps(&["a", "b"])).unwrap_err();

    let FormularyError::UnsatisfiableRequirements { requirements } = err else {
        panic!("expected unsatisfiable requirements");
    };
    assert!(requirements.iter().all(|r| r.name == "c"));
    assert!(!requirements.is_empty());
}

#[test]
fn test_shared_dependency_pinned_once() {
    let index = index(
        r#"{
            "a": {"versions": {"1.0.0": {"dependencies": ["c>=1"]}}},
            "b": {"versions": {"1.0.0": {"dependencies": ["c<3"]}}},
            "c": {"versions": {"1.0.0": {}, "2.0.0": {}, "3.0.0": {}}}
        }"#,
    );
    let resolver = Resolver::new(IndexProvider::new(&index));
    let packages = resolver.resolve(&deps(&["a", "b"])).unwrap();
    assert_eq!(
        pinned(&packages),
        pairs(&[("a", "1.0.0"), ("b", "1.0.0"), ("c", "2.0.0")])
    );
}

#[test]
fn test_resolution_is_deterministic() {
    let index = index(
        r#"{
            "x": {"versions": {"1.0.0": {"dependencies": ["z"]}, "1.1.0": {"dependencies": ["z<2"]}}},
            "y": {"versions": {"1.0.0": {"dependencies": ["z>=1"]}}},
            "z": {"versions": {"1.0.0": {}, "1.5.0": {}, "2.0.0": {}}}
        }"#,
    );
    let first = Resolver::new(IndexProvider::new(&index))
        .resolve(&deps(&["x", "y"]))
        .unwrap();
    for _ in 0..5 {
        let again = Resolver::new(IndexProvider::new(&index))
            .resolve(&deps(&["x", "y"]))
            .unwrap();
        assert_eq!(
            first.iter().map(|p| (&p.name, &p.version)).collect::<Vec<_>>(),
            again.iter().map(|p| (&p.name, &p.version)).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_round_limit() {
    let index = index(
        r#"{
            "pkg-a": {"versions": {"1.0.0": {}}},
            "pkg-b": {"versions": {"1.0.0": {"dependencies": ["pkg-a"]}}}
        }"#,
    );
    let resolver = Resolver::new(IndexProvider::new(&index)).with_max_rounds(1);
    let err = resolver.resolve(&deps(&["pkg-b"])).unwrap_err();
    assert!(matches!(err, FormularyError::ResolutionTooComplex { rounds: 1 }));
}

#[test]
fn test_empty_requirements() {
    let index = index("{}");
    let resolver = Resolver::new(IndexProvider::new(&index));
    assert!(resolver.resolve(&[]).unwrap().is_empty());
}

/// Index that records which metadata lookups happened
struct CountingIndex {
    inner: RegistryIndex,
    lookups: RefCell<Vec<String>>,
}

impl PackageIndex for CountingIndex {
    fn get_versions(&self, name: &str) -> Vec<Version> {
        self.inner.get_versions(name)
    }

    fn get_package_metadata(&self, name: &str, version: &Version) -> RegistryResult<VersionMetadata> {
        self.lookups.borrow_mut().push(format!("{name}@{version}"));
        self.inner.get_package_metadata(name, version)
    }
}

#[test]
fn test_dependencies_fetched_lazily() {
    let counting = CountingIndex {
        inner: index(
            r#"{
                "pkg-a": {"versions": {"1.0.0": {}, "2.0.0": {}, "3.0.0": {}}},
                "pkg-b": {"versions": {"1.0.0": {"dependencies": ["pkg-a"]}}}
            }"#,
        ),
        lookups: RefCell::new(Vec::new()),
    };
    let resolver = Resolver::new(IndexProvider::new(&counting));
    resolver.resolve(&deps(&["pkg-b"])).unwrap();

    // Only the chosen candidates are asked for metadata
    assert_eq!(
        *counting.lookups.borrow(),
        vec!["pkg-b@1.0.0".to_string(), "pkg-a@3.0.0".to_string()]
    );
}

//! Common utilities for benchmarks

use criterion::Criterion;
use formulary_core::types::FunctionDefinition;
use formulary_registry::{PackageEntry, RegistryIndex, VersionMetadata};
use indexmap::IndexMap;
use pprof::criterion::{Output, PProfProfiler};

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// A formula with `depth` nested `LET` bindings that each call `HELPER`
pub fn nested_formula(depth: usize) -> String {
    let mut formula = String::from("=");
    for i in 0..depth {
        formula.push_str(&format!("LET(v{i}, HELPER(v{prev}, \"text, {i}\") + {{1,2;3,4}}, ", prev = i.saturating_sub(1)));
    }
    formula.push_str("LAMBDA(x, HELPER(x) * SUM(A1:B2, Sheet1!C3))(1)");
    for _ in 0..depth {
        formula.push(')');
    }
    formula
}

/// A chain of `packages` packages, each with `versions` versions, where
/// package `i` depends on package `i + 1` with a caret requirement.
///
/// The newest version of every package requires a major version of its
/// successor that does not exist, forcing one backtrack per package.
pub fn chain_index(packages: usize, versions: usize) -> RegistryIndex {
    let mut index = RegistryIndex::default();
    for i in 0..packages {
        let mut entry = PackageEntry::default();
        for v in 0..versions {
            let mut metadata = VersionMetadata::default();
            if i + 1 < packages {
                let major = if v + 1 == versions { 99 } else { 1 };
                metadata.dependencies = vec![format!("pkg-{}^{}.0", i + 1, major)];
            }
            entry.versions.insert(format!("1.{}.0", v), metadata);
        }
        index.packages.insert(format!("pkg-{}", i), entry);
    }
    index
}

/// `count` functions whose bodies reference their neighbours
pub fn sample_functions(count: usize) -> IndexMap<String, FunctionDefinition> {
    (0..count)
        .map(|i| {
            let name = format!("FN_{}", i);
            let body = format!("=LAMBDA(x, FN_{}(x) + {})", (i + 1) % count.max(1), i);
            (name.clone(), FunctionDefinition::new(name, body).with_argument("x"))
        })
        .collect()
}

//! Backtracking dependency resolution
//!
//! The resolver keeps a partial assignment (identifier -> pinned candidate)
//! and the requirements known so far for every identifier. Each round it
//! picks the unpinned identifier with the fewest viable candidates (ties go
//! to the identifier seen first), tries its candidates newest first, and
//! backtracks when a newly discovered requirement leaves some identifier
//! with no viable candidate. State is cloned per choice, so undoing a choice
//! is dropping its state.

use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, info, trace};

use crate::provider::{Provider, Requirement};
use crate::ResolverResult;
use formulary_core::error::FormularyError;
use formulary_core::types::{Dependency, Package};

/// Default limit on search rounds before giving up
pub const DEFAULT_MAX_ROUNDS: usize = 200_000;

/// Result of dependency resolution
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    /// One package per identifier, in the order they were pinned
    pub packages: Vec<Package>,
    /// Search rounds used
    pub rounds: usize,
    /// Candidates abandoned after a conflict
    pub backtracks: usize,
    /// Resolution time in milliseconds
    pub resolution_time_ms: u64,
}

/// Search state for one branch
#[derive(Debug, Clone, Default)]
struct State {
    /// Every requirement seen, grouped by identifier in discovery order
    requirements: IndexMap<String, Vec<Requirement>>,
    /// Pinned candidates
    mapping: IndexMap<String, Package>,
}

impl State {
    fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.requirements
            .keys()
            .map(String::as_str)
            .filter(|name| !self.mapping.contains_key(*name))
    }

    fn requirements_for(&self, name: &str) -> &[Requirement] {
        self.requirements.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Bookkeeping shared by every branch of one resolution
#[derive(Debug, Default)]
struct Search {
    rounds: usize,
    backtracks: usize,
    /// Requirements involved in the most recent conflict
    causes: Vec<Requirement>,
}

/// Backtracking resolver over a [`Provider`]
pub struct Resolver<P: Provider> {
    provider: P,
    max_rounds: usize,
}

impl<P: Provider> Resolver<P> {
    /// Create a resolver with the default round limit
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Limit the number of search rounds
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// The wrapped provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Resolve `requirements` to one package per identifier
    pub fn resolve(&self, requirements: &[Dependency]) -> ResolverResult<Vec<Package>> {
        self.resolve_with_stats(requirements).map(|result| result.packages)
    }

    /// Resolve and report search statistics
    pub fn resolve_with_stats(&self, requirements: &[Dependency]) -> ResolverResult<ResolutionResult> {
        let start_time = Instant::now();
        let mut state = State::default();
        for dependency in requirements {
            let requirement = Requirement::new(dependency.clone())?;
            let name = self.provider.identify(&requirement).to_string();
            state.requirements.entry(name).or_default().push(requirement);
        }

        let mut search = Search::default();
        let resolved = self.search(state, &mut search)?;

        let Some(state) = resolved else {
            let mut causes = std::mem::take(&mut search.causes);
            if causes.is_empty() {
                causes = requirements
                    .iter()
                    .cloned()
                    .map(Requirement::new)
                    .collect::<ResolverResult<_>>()?;
            }
            return Err(FormularyError::UnsatisfiableRequirements {
                requirements: causes.into_iter().map(|r| r.dependency).collect(),
            });
        };

        let resolution_time_ms = start_time.elapsed().as_millis() as u64;
        info!(
            packages = state.mapping.len(),
            rounds = search.rounds,
            backtracks = search.backtracks,
            resolution_time_ms,
            "resolution complete"
        );

        Ok(ResolutionResult {
            packages: state.mapping.into_values().collect(),
            rounds: search.rounds,
            backtracks: search.backtracks,
            resolution_time_ms,
        })
    }

    /// Pick the unresolved identifier with the fewest candidates
    fn next_identifier(&self, state: &State) -> Option<(String, Vec<Package>)> {
        let mut best: Option<(String, Vec<Package>)> = None;
        for name in state.unresolved() {
            let candidates = self.provider.find_matches(name, state.requirements_for(name));
            let better = match &best {
                Some((_, current)) => candidates.len() < current.len(),
                None => true,
            };
            if better {
                let empty = candidates.is_empty();
                best = Some((name.to_string(), candidates));
                if empty {
                    break;
                }
            }
        }
        best
    }

    /// Depth-first search; `Ok(None)` when this branch is exhausted
    fn search(&self, state: State, search: &mut Search) -> ResolverResult<Option<State>> {
        search.rounds += 1;
        if search.rounds > self.max_rounds {
            return Err(FormularyError::ResolutionTooComplex {
                rounds: self.max_rounds,
            });
        }

        let Some((identifier, candidates)) = self.next_identifier(&state) else {
            return Ok(Some(state));
        };

        if candidates.is_empty() {
            debug!(package = %identifier, "no candidate satisfies the requirements");
            search.causes = state.requirements_for(&identifier).to_vec();
            return Ok(None);
        }

        for candidate in candidates {
            trace!(package = %identifier, version = %candidate.version, "trying candidate");
            let dependencies = self.provider.get_dependencies(&candidate)?;

            match self.pin(&state, candidate, &dependencies)? {
                Ok(next) => {
                    if let Some(resolved) = self.search(next, search)? {
                        return Ok(Some(resolved));
                    }
                },
                Err(causes) => search.causes = causes,
            }

            search.backtracks += 1;
            debug!(package = %identifier, "backtracking");
        }

        Ok(None)
    }

    /// Pin `candidate` in a copy of `state` and add its requirements.
    ///
    /// The inner `Err` carries the requirements that conflicted.
    fn pin(
        &self,
        state: &State,
        candidate: Package,
        dependencies: &[Dependency],
    ) -> ResolverResult<Result<State, Vec<Requirement>>> {
        let mut next = state.clone();
        let candidate =
            candidate.with_dependencies(dependencies.iter().map(ToString::to_string).collect());
        next.mapping.insert(candidate.name.clone(), candidate);

        for dependency in dependencies {
            let requirement = Requirement::new(dependency.clone())?;
            let name = self.provider.identify(&requirement).to_string();
            next.requirements
                .entry(name.clone())
                .or_default()
                .push(requirement.clone());

            let viable = match next.mapping.get(&name) {
                Some(pinned) => self.provider.is_satisfied_by(&requirement, pinned),
                None => !self
                    .provider
                    .find_matches(&name, next.requirements_for(&name))
                    .is_empty(),
            };
            if !viable {
                debug!(requirement = %requirement, "requirement conflicts with current assignment");
                return Ok(Err(next.requirements_for(&name).to_vec()));
            }
        }

        Ok(Ok(next))
    }
}

#[cfg(test)]
mod tests;

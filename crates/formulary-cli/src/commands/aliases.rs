//! Function aliases for resolving install collisions.
//!
//! Aliases come from `--rename PKG:OLD=NEW` flags up front, and from the
//! user when the reconciler reports a collision.

use formulary_core::error::{FormularyError, FormularyResult};
use formulary_core::types::is_reserved;
use formulary_installer::RenameMaps;
use std::future::Future;
use tracing::debug;

use crate::output::OutputHandler;

/// Parse `PKG:OLD=NEW`
pub fn parse_rename(spec: &str) -> FormularyResult<(String, String, String)> {
    let invalid = |reason: &str| FormularyError::ConfigValidation {
        field: "rename".to_string(),
        reason: format!("'{}' {}", spec, reason),
    };

    let (package, mapping) = spec
        .split_once(':')
        .ok_or_else(|| invalid("must look like PKG:OLD=NEW"))?;
    let (old, new) = mapping
        .split_once('=')
        .ok_or_else(|| invalid("must look like PKG:OLD=NEW"))?;
    let (package, old, new) = (package.trim(), old.trim(), new.trim());

    if package.is_empty() || old.is_empty() {
        return Err(invalid("must look like PKG:OLD=NEW"));
    }
    if !is_valid_alias(new) {
        return Err(invalid("has an invalid new function name"));
    }
    Ok((package.to_string(), old.to_string(), new.to_string()))
}

/// Collect `--rename` flags into per package maps
pub fn rename_maps(specs: &[String]) -> FormularyResult<RenameMaps> {
    let mut maps = RenameMaps::new();
    for spec in specs {
        let (package, old, new) = parse_rename(spec)?;
        maps.entry(package).or_default().insert(old, new);
    }
    Ok(maps)
}

/// Check that `name` can be used as a named function
pub fn is_valid_alias(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !is_reserved(name)
}

/// Where replacement names for colliding functions come from
pub trait AliasSource {
    /// Alias for `function` of `package`; `None` gives up
    fn alias(&mut self, package: &str, function: &str) -> FormularyResult<Option<String>>;
}

/// Never offers an alias, so collisions are reported as errors
pub struct NoPrompt;

impl AliasSource for NoPrompt {
    fn alias(&mut self, _package: &str, _function: &str) -> FormularyResult<Option<String>> {
        Ok(None)
    }
}

/// Asks on stdin; an empty answer gives up
pub struct TerminalPrompt<'a> {
    pub output: &'a OutputHandler,
}

impl AliasSource for TerminalPrompt<'_> {
    fn alias(&mut self, package: &str, function: &str) -> FormularyResult<Option<String>> {
        loop {
            self.output.prompt(&format!(
                "'{}' from {} already exists. New name (empty to abort):",
                function, package
            ));
            let mut answer = String::new();
            std::io::stdin()
                .read_line(&mut answer)
                .map_err(|e| FormularyError::io("Failed to read alias".to_string(), e))?;
            let answer = answer.trim();

            if answer.is_empty() {
                return Ok(None);
            }
            if is_valid_alias(answer) {
                return Ok(Some(answer.to_string()));
            }
            self.output.warn(&format!("'{}' is not a valid function name", answer));
        }
    }
}

/// Run `attempt` until it stops failing with a collision.
///
/// Each collision asks `aliases` for one alias per conflicting name and
/// retries the whole operation with the extended rename maps. A conflicting
/// name that is itself an alias replaces that alias.
pub async fn retry_with_aliases<T, F, Fut, A>(
    renames: &mut RenameMaps,
    aliases: &mut A,
    mut attempt: F,
) -> FormularyResult<T>
where
    F: FnMut(RenameMaps) -> Fut,
    Fut: Future<Output = FormularyResult<T>>,
    A: AliasSource + ?Sized,
{
    loop {
        let (package, conflicts) = match attempt(renames.clone()).await {
            Err(FormularyError::FunctionCollision { package, conflicts }) => (package, conflicts),
            other => return other,
        };

        let map = renames.entry(package.clone()).or_default();
        for function in &conflicts {
            let Some(alias) = aliases.alias(&package, function)? else {
                return Err(FormularyError::FunctionCollision {
                    package: package.clone(),
                    conflicts: conflicts.clone(),
                });
            };
            let original = map
                .iter()
                .find(|(_, aliased)| aliased.as_str() == function.as_str())
                .map(|(original, _)| original.clone())
                .unwrap_or_else(|| function.clone());
            debug!(package = %package, function = %original, alias = %alias, "aliasing function");
            map.insert(original, alias);
        }
    }
}

//! Project metadata and lockfile persistence
//!
//! Both live in reserved named functions whose body is an array literal:
//!
//! ```text
//! __GSPROJECT__  ={"Key","Value";"name","demo";"version","0.1.0";...}
//! __LOCK__       ={"Package","Version","Resolved","Integrity","Dependencies","Functions";...}
//! ```
//!
//! Cells are quoted with `""` escaping a quote. List values (dependencies,
//! functions) are joined with commas. Older workbooks stored the project
//! metadata as a JSON string literal; that form is still read.

use formulary_core::types::dependency::is_name_char;
use formulary_core::types::{
    FunctionDefinition, Lockfile, PackageLock, ProjectMetadata, LOCK_FUNCTION, PROJECT_FUNCTION,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::store::FunctionStore;
use crate::InstallerResult;

const PROJECT_HEADER: [&str; 2] = ["Key", "Value"];
const LOCK_HEADER: [&str; 6] = [
    "Package",
    "Version",
    "Resolved",
    "Integrity",
    "Dependencies",
    "Functions",
];

/// Split an array literal `={"a","b";"c","d"}` into rows of cells.
///
/// Anything that is not an array literal yields no rows. Characters outside
/// quotes other than separators are ignored.
pub fn parse_array_literal(definition: &str) -> Vec<Vec<String>> {
    let definition = definition.trim();
    let content = match definition
        .strip_prefix("={")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(content) => content,
        None => return Vec::new(),
    };

    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell = String::new();
    let mut in_quote = false;
    let mut row_open = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quote {
            if c != '"' {
                cell.push(c);
            } else if chars.peek() == Some(&'"') {
                cell.push('"');
                chars.next();
            } else {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_quote = true;
                row_open = true;
            },
            ',' => {
                row.push(std::mem::take(&mut cell));
                row_open = true;
            },
            ';' => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
                row_open = false;
            },
            _ => {},
        }
    }

    if row_open {
        row.push(cell);
        rows.push(row);
    }
    rows
}

/// Render rows as an array literal, quoting every cell
pub fn format_array_literal<R, C>(rows: R) -> String
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = C>,
    C: AsRef<str>,
{
    let rendered: Vec<String> = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| format!("\"{}\"", cell.as_ref().replace('"', "\"\"")))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    format!("={{{}}}", rendered.join(";"))
}

/// Split a comma-joined list cell.
///
/// A fragment that cannot start a requirement (`<2.0` in `pkg>=1.0,<2.0`)
/// belongs to the entry before it.
fn split_list(cell: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for fragment in cell.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        let starts_entry = fragment.chars().next().map_or(false, is_name_char);
        match items.last_mut() {
            Some(last) if !starts_entry => {
                last.push(',');
                last.push_str(fragment);
            },
            _ => items.push(fragment.to_string()),
        }
    }
    items
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(cell_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn optional(cell: Option<&String>) -> Option<String> {
    cell.filter(|c| !c.is_empty()).cloned()
}

/// Read project metadata from the body of `__GSPROJECT__`
pub fn decode_project(definition: &str) -> Option<ProjectMetadata> {
    let trimmed = definition.trim();

    let legacy_json = if let Some(inner) = trimmed.strip_prefix("=\"") {
        Some(inner.strip_suffix('"').unwrap_or(inner).replace("\"\"", "\""))
    } else if trimmed.starts_with('{') {
        Some(trimmed.to_string())
    } else {
        None
    };
    if let Some(json) = legacy_json {
        match serde_json::from_str::<ProjectMetadata>(&json) {
            Ok(metadata) => return Some(metadata),
            Err(e) => warn!(error = %e, "ignoring unreadable legacy project metadata"),
        }
    }

    let rows = parse_array_literal(trimmed);
    if rows.len() < 2 {
        return None;
    }

    let mut metadata = ProjectMetadata::default();
    for row in rows.iter().skip(1).filter(|row| row.len() >= 2) {
        let (key, value) = (row[0].as_str(), row[1].as_str());
        match key {
            "name" => metadata.name = value.to_string(),
            "version" => metadata.version = value.to_string(),
            "description" => metadata.description = value.to_string(),
            "dependencies" => metadata.dependencies = split_list(value),
            _ => {
                metadata
                    .extra
                    .insert(key.to_string(), Value::String(value.to_string()));
            },
        }
    }
    Some(metadata)
}

/// Build the `__GSPROJECT__` function for `metadata`
pub fn encode_project(metadata: &ProjectMetadata) -> FunctionDefinition {
    let mut rows: Vec<Vec<String>> = vec![PROJECT_HEADER.iter().map(|s| s.to_string()).collect()];
    rows.push(vec!["name".to_string(), metadata.name.clone()]);
    rows.push(vec!["version".to_string(), metadata.version.clone()]);
    rows.push(vec!["description".to_string(), metadata.description.clone()]);
    rows.push(vec!["dependencies".to_string(), metadata.dependencies.join(",")]);
    for (key, value) in &metadata.extra {
        rows.push(vec![key.clone(), cell_text(value)]);
    }
    FunctionDefinition::new(PROJECT_FUNCTION, format_array_literal(rows))
        .with_description("Project Metadata")
}

/// Read the lockfile from the body of `__LOCK__`
pub fn decode_lockfile(definition: &str) -> Option<Lockfile> {
    let rows = parse_array_literal(definition);
    if rows.is_empty() {
        return None;
    }

    let mut lockfile = Lockfile::new();
    for row in rows.iter().skip(1).filter(|row| row.len() >= 2) {
        let entry = PackageLock {
            version: row[1].clone(),
            resolved: optional(row.get(2)),
            integrity: optional(row.get(3)),
            dependencies: row.get(4).map(|c| split_list(c)).unwrap_or_default(),
            functions: row.get(5).map(|c| split_list(c)).unwrap_or_default(),
        };
        lockfile.insert(row[0].clone(), entry);
    }

    let shared = lockfile.shared_functions();
    if !shared.is_empty() {
        warn!(functions = ?shared, "lockfile gives functions to several packages, keeping first owner");
        let mut claimed = HashSet::new();
        for entry in lockfile.packages.values_mut() {
            entry.functions.retain(|name| claimed.insert(name.clone()));
        }
    }
    Some(lockfile)
}

/// Build the `__LOCK__` function for `lockfile`
pub fn encode_lockfile(lockfile: &Lockfile) -> FunctionDefinition {
    let mut rows: Vec<Vec<String>> = vec![LOCK_HEADER.iter().map(|s| s.to_string()).collect()];
    for (name, entry) in &lockfile.packages {
        rows.push(vec![
            name.clone(),
            entry.version.clone(),
            entry.resolved.clone().unwrap_or_default(),
            entry.integrity.clone().unwrap_or_default(),
            entry.dependencies.join(","),
            entry.functions.join(","),
        ]);
    }
    FunctionDefinition::new(LOCK_FUNCTION, format_array_literal(rows))
        .with_description("Project Lockfile")
}

/// Decode both reserved functions from a function snapshot
pub fn decode_workbook(
    functions: &IndexMap<String, FunctionDefinition>,
) -> (Option<ProjectMetadata>, Option<Lockfile>) {
    let project = functions
        .get(PROJECT_FUNCTION)
        .and_then(|f| decode_project(&f.definition));
    let lockfile = functions
        .get(LOCK_FUNCTION)
        .and_then(|f| decode_lockfile(&f.definition));
    (project, lockfile)
}

/// Reads and writes the reserved bookkeeping functions of a store
pub struct MetadataManager<'s, S: FunctionStore> {
    store: &'s S,
}

impl<'s, S: FunctionStore> MetadataManager<'s, S> {
    /// Create a manager over `store`
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Project metadata and lockfile, read with a single store call
    pub async fn load(&self) -> InstallerResult<(Option<ProjectMetadata>, Option<Lockfile>)> {
        let functions = self.store.get_named_functions().await?;
        Ok(decode_workbook(&functions))
    }

    /// Project metadata, if the workbook has any
    pub async fn project_metadata(&self) -> InstallerResult<Option<ProjectMetadata>> {
        Ok(self.load().await?.0)
    }

    /// Lockfile, if the workbook has one
    pub async fn lockfile(&self) -> InstallerResult<Option<Lockfile>> {
        Ok(self.load().await?.1)
    }

    /// Write `__GSPROJECT__`
    pub async fn save_project_metadata(&self, metadata: &ProjectMetadata) -> InstallerResult<()> {
        self.store.update_function(&encode_project(metadata)).await
    }

    /// Write `__LOCK__`
    pub async fn save_lockfile(&self, lockfile: &Lockfile) -> InstallerResult<()> {
        self.store.update_function(&encode_lockfile(lockfile)).await
    }
}

//! The `.gspkg` archive format
//!
//! A package archive is a zip container with three entries:
//! `__GSPROJECT__.json` (project metadata), an optional `__LOCK__.json`
//! (the lockfile of the publishing project) and `functions.json`, mapping
//! each function name to `{definition, description, arguments}`.
//! `arguments` is written as `{name: {description, example}}`; an ordered
//! list of names is also accepted on read.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use formulary_core::error::FormularyError;
use formulary_core::types::{ArgumentMetadata, FunctionDefinition, Lockfile, ProjectMetadata};
use formulary_core::utils::integrity_of;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::CacheResult;

/// Archive entry holding the project metadata
pub const METADATA_ENTRY: &str = "__GSPROJECT__.json";
/// Archive entry holding the lockfile
pub const LOCK_ENTRY: &str = "__LOCK__.json";
/// Archive entry holding the function bundle
pub const FUNCTIONS_ENTRY: &str = "functions.json";

/// Everything read from an archive
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPackage {
    pub metadata: ProjectMetadata,
    /// Empty when the archive carries no lockfile
    pub lockfile: Lockfile,
    pub functions: IndexMap<String, FunctionDefinition>,
    /// `sha256:<hex>` of the archive bytes
    pub integrity: String,
}

/// One function as stored in `functions.json`
#[derive(Debug, Serialize, Deserialize)]
struct ArchivedFunction {
    definition: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    arguments: ArchivedArguments,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ArchivedArguments {
    Documented(IndexMap<String, ArgumentMetadata>),
    Names(Vec<String>),
}

impl Default for ArchivedArguments {
    fn default() -> Self {
        Self::Names(Vec::new())
    }
}

impl ArchivedFunction {
    fn from_definition(function: &FunctionDefinition) -> Self {
        let arguments = function
            .arguments
            .iter()
            .map(|arg| (arg.clone(), function.argument_info(arg)))
            .collect();
        Self {
            definition: function.definition.clone(),
            description: function.description.clone(),
            arguments: ArchivedArguments::Documented(arguments),
        }
    }

    fn into_definition(self, name: String) -> FunctionDefinition {
        let (arguments, argument_metadata) = match self.arguments {
            ArchivedArguments::Documented(map) => (map.keys().cloned().collect(), map),
            ArchivedArguments::Names(names) => (names, IndexMap::new()),
        };
        FunctionDefinition {
            name,
            definition: self.definition,
            description: self.description,
            arguments,
            argument_metadata,
        }
    }
}

fn corrupt(label: &str, reason: impl std::fmt::Display) -> FormularyError {
    FormularyError::ArchiveCorrupt {
        path: label.to_string(),
        reason: reason.to_string(),
    }
}

/// Read one entry; `None` if the archive does not have it
fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    label: &str,
) -> CacheResult<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(corrupt(label, e)),
    };
    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data).map_err(|e| corrupt(label, e))?;
    Ok(Some(data))
}

fn parse_entry<T: for<'de> Deserialize<'de>>(data: &[u8], entry: &str, label: &str) -> CacheResult<T> {
    serde_json::from_slice(data).map_err(|e| corrupt(label, format!("{}: {}", entry, e)))
}

/// Read an archive from memory; `label` names it in errors
pub fn extract_archive_bytes(data: &[u8], label: &str) -> CacheResult<ExtractedPackage> {
    let integrity = integrity_of(data);
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| corrupt(label, e))?;

    let metadata_bytes = read_entry(&mut archive, METADATA_ENTRY, label)?
        .ok_or_else(|| corrupt(label, format!("missing {}", METADATA_ENTRY)))?;
    let metadata: ProjectMetadata = parse_entry(&metadata_bytes, METADATA_ENTRY, label)?;

    let functions_bytes = read_entry(&mut archive, FUNCTIONS_ENTRY, label)?
        .ok_or_else(|| corrupt(label, format!("missing {}", FUNCTIONS_ENTRY)))?;
    let archived: IndexMap<String, ArchivedFunction> = parse_entry(&functions_bytes, FUNCTIONS_ENTRY, label)?;
    let functions = archived
        .into_iter()
        .map(|(name, function)| (name.clone(), function.into_definition(name)))
        .collect();

    let lockfile = match read_entry(&mut archive, LOCK_ENTRY, label)? {
        Some(bytes) => parse_entry(&bytes, LOCK_ENTRY, label)?,
        None => Lockfile::new(),
    };

    Ok(ExtractedPackage {
        metadata,
        lockfile,
        functions,
        integrity,
    })
}

/// Read an archive file
pub fn extract_archive(path: &Path) -> CacheResult<ExtractedPackage> {
    let data = std::fs::read(path)
        .map_err(|e| FormularyError::io(format!("Failed to read archive {}", path.display()), e))?;
    let package = extract_archive_bytes(&data, &path.display().to_string())?;
    debug!(
        path = %path.display(),
        package = %package.metadata.name,
        functions = package.functions.len(),
        "extracted archive"
    );
    Ok(package)
}

fn pretty_json<T: Serialize + ?Sized>(value: &T, entry: &str) -> CacheResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| FormularyError::json(entry, e))
}

fn write_entry(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    entry: &str,
    data: &[u8],
    label: &str,
) -> CacheResult<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry, options).map_err(|e| corrupt(label, e))?;
    zip.write_all(data)
        .map_err(|e| FormularyError::io(format!("Failed to write {}", entry), e))
}

/// Build archive bytes in memory
pub fn build_archive(
    metadata: &ProjectMetadata,
    functions: &IndexMap<String, FunctionDefinition>,
    lockfile: Option<&Lockfile>,
) -> CacheResult<Vec<u8>> {
    let label = format!("{}-{}", metadata.name, metadata.version);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    write_entry(&mut zip, METADATA_ENTRY, &pretty_json(metadata, METADATA_ENTRY)?, &label)?;
    if let Some(lockfile) = lockfile {
        write_entry(&mut zip, LOCK_ENTRY, &pretty_json(lockfile, LOCK_ENTRY)?, &label)?;
    }
    let archived: IndexMap<&str, ArchivedFunction> = functions
        .iter()
        .map(|(name, function)| (name.as_str(), ArchivedFunction::from_definition(function)))
        .collect();
    write_entry(&mut zip, FUNCTIONS_ENTRY, &pretty_json(&archived, FUNCTIONS_ENTRY)?, &label)?;

    let cursor = zip.finish().map_err(|e| corrupt(&label, e))?;
    Ok(cursor.into_inner())
}

/// Write an archive file; returns the number of bytes written
pub fn create_archive(
    path: &Path,
    metadata: &ProjectMetadata,
    functions: &IndexMap<String, FunctionDefinition>,
    lockfile: Option<&Lockfile>,
) -> CacheResult<u64> {
    let data = build_archive(metadata, functions, lockfile)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| FormularyError::io(format!("Failed to create {}", dir.display()), e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| FormularyError::io(format!("Failed to create temp file in {}", dir.display()), e))?;
    temp.write_all(&data)
        .map_err(|e| FormularyError::io("Failed to write archive".to_string(), e))?;
    temp.persist(path).map_err(|e| {
        FormularyError::io(format!("Failed to move archive to {}", path.display()), e.error)
    })?;

    debug!(path = %path.display(), bytes = data.len(), functions = functions.len(), "created archive");
    Ok(data.len() as u64)
}

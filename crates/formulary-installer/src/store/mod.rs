//! Function store capability
//!
//! A workbook is a flat namespace of named functions. The reconciler only
//! ever reads a snapshot of it and, once a plan is validated, issues single
//! create / update / delete calls in sequence.

use camino::{Utf8Path, Utf8PathBuf};
use formulary_core::error::FormularyError;
use formulary_core::types::FunctionDefinition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::debug;

use crate::InstallerResult;

/// Named function storage of a workbook
pub trait FunctionStore: Send + Sync {
    /// Every named function, keyed by name
    fn get_named_functions(
        &self,
    ) -> impl Future<Output = InstallerResult<IndexMap<String, FunctionDefinition>>> + Send;

    /// Add a function; an existing function with the same name is replaced
    fn create_function(
        &self,
        function: &FunctionDefinition,
    ) -> impl Future<Output = InstallerResult<()>> + Send;

    /// Replace a function, creating it when absent
    fn update_function(
        &self,
        function: &FunctionDefinition,
    ) -> impl Future<Output = InstallerResult<()>> + Send;

    /// Delete a function; deleting an absent name is a no-op
    fn delete_function(&self, name: &str) -> impl Future<Output = InstallerResult<()>> + Send;
}

/// A mutation issued against a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Create(String),
    Update(String),
    Delete(String),
}

/// In-memory store that records every mutation
#[derive(Debug, Default)]
pub struct MemoryFunctionStore {
    functions: Mutex<IndexMap<String, FunctionDefinition>>,
    operations: Mutex<Vec<StoreOperation>>,
}

impl MemoryFunctionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `functions`
    pub fn with_functions(functions: impl IntoIterator<Item = FunctionDefinition>) -> Self {
        let functions = functions
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();
        Self {
            functions: Mutex::new(functions),
            operations: Mutex::new(Vec::new()),
        }
    }

    /// Mutations issued so far, oldest first
    pub async fn operations(&self) -> Vec<StoreOperation> {
        self.operations.lock().await.clone()
    }

    /// Forget recorded mutations
    pub async fn clear_operations(&self) {
        self.operations.lock().await.clear();
    }

    async fn record(&self, operation: StoreOperation) {
        self.operations.lock().await.push(operation);
    }
}

impl FunctionStore for MemoryFunctionStore {
    async fn get_named_functions(&self) -> InstallerResult<IndexMap<String, FunctionDefinition>> {
        Ok(self.functions.lock().await.clone())
    }

    async fn create_function(&self, function: &FunctionDefinition) -> InstallerResult<()> {
        self.functions
            .lock()
            .await
            .insert(function.name.clone(), function.clone());
        self.record(StoreOperation::Create(function.name.clone())).await;
        Ok(())
    }

    async fn update_function(&self, function: &FunctionDefinition) -> InstallerResult<()> {
        self.functions
            .lock()
            .await
            .insert(function.name.clone(), function.clone());
        self.record(StoreOperation::Update(function.name.clone())).await;
        Ok(())
    }

    async fn delete_function(&self, name: &str) -> InstallerResult<()> {
        self.functions.lock().await.shift_remove(name);
        self.record(StoreOperation::Delete(name.to_string())).await;
        Ok(())
    }
}

/// On-disk layout of a workbook file
#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkbookDocument {
    #[serde(default)]
    functions: IndexMap<String, FunctionDefinition>,
}

/// A workbook kept as a JSON file.
///
/// The file holds `{"functions": {name: definition}}`. It is read on every
/// call and rewritten through a temporary sibling file on every mutation.
/// A missing file is an empty workbook.
#[derive(Debug)]
pub struct WorkbookFile {
    path: Utf8PathBuf,
    write_lock: Mutex<()>,
}

impl WorkbookFile {
    /// Open the workbook at `path`
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the workbook file
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    async fn read(&self) -> InstallerResult<WorkbookDocument> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(WorkbookDocument::default());
            },
            Err(e) => {
                return Err(FormularyError::io(format!("Failed to read workbook {}", self.path), e));
            },
        };
        let mut document: WorkbookDocument =
            serde_json::from_slice(&data).map_err(|e| FormularyError::json(self.path.as_str(), e))?;
        for (name, function) in document.functions.iter_mut() {
            function.name = name.clone();
        }
        Ok(document)
    }

    async fn write(&self, document: &WorkbookDocument) -> InstallerResult<()> {
        let data = serde_json::to_vec_pretty(document)
            .map_err(|e| FormularyError::json(self.path.as_str(), e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FormularyError::io(format!("Failed to create {}", parent), e))?;
        }

        let partial = Utf8PathBuf::from(format!("{}.tmp", self.path));
        tokio::fs::write(&partial, &data)
            .await
            .map_err(|e| FormularyError::io(format!("Failed to write {}", partial), e))?;
        tokio::fs::rename(&partial, &self.path)
            .await
            .map_err(|e| FormularyError::io(format!("Failed to replace workbook {}", self.path), e))
    }

    async fn modify(
        &self,
        change: impl FnOnce(&mut IndexMap<String, FunctionDefinition>),
    ) -> InstallerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read().await?;
        change(&mut document.functions);
        self.write(&document).await
    }
}

impl FunctionStore for WorkbookFile {
    async fn get_named_functions(&self) -> InstallerResult<IndexMap<String, FunctionDefinition>> {
        Ok(self.read().await?.functions)
    }

    async fn create_function(&self, function: &FunctionDefinition) -> InstallerResult<()> {
        debug!(function = %function.name, workbook = %self.path, "create function");
        self.modify(|functions| {
            functions.insert(function.name.clone(), function.clone());
        })
        .await
    }

    async fn update_function(&self, function: &FunctionDefinition) -> InstallerResult<()> {
        debug!(function = %function.name, workbook = %self.path, "update function");
        self.modify(|functions| {
            functions.insert(function.name.clone(), function.clone());
        })
        .await
    }

    async fn delete_function(&self, name: &str) -> InstallerResult<()> {
        debug!(function = name, workbook = %self.path, "delete function");
        self.modify(|functions| {
            functions.shift_remove(name);
        })
        .await
    }
}

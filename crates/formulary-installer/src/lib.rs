//! Workbook reconciliation for Formulary
//!
//! This crate turns user intent (install, upgrade or remove packages) into a
//! validated target state for a workbook: the functions to write, the
//! functions to delete and the new lockfile. Nothing is written until the
//! whole plan has been computed; [`apply_plan`] then persists it through a
//! [`FunctionStore`], one operation at a time.
//!
//! ## Layout
//!
//! - `store`: the function store capability and its in-memory and JSON file backends
//! - `metadata`: project metadata and lockfile encoding in the reserved functions
//! - `reconciler`: the install / upgrade / remove / develop pipeline
//! - `project`: `init` and `pack` for the project being authored

pub mod metadata;
pub mod project;
pub mod reconciler;
pub mod store;

// Re-export main types
pub use metadata::{decode_workbook, format_array_literal, parse_array_literal, MetadataManager};
pub use project::{init_project, pack_project, package_functions, InitOptions, PackOutcome};
pub use reconciler::{
    apply_plan, ApplySummary, DevelopOutcome, InstallTarget, Plan, Reconciler, RenameMaps,
    UpgradeOutcome, WorkbookState,
};
pub use store::{FunctionStore, MemoryFunctionStore, StoreOperation, WorkbookFile};

use formulary_core::error::FormularyError;

/// Result type for installer operations
pub type InstallerResult<T> = Result<T, FormularyError>;

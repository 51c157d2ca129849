//! Named function definitions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reserved function holding the project metadata
pub const PROJECT_FUNCTION: &str = "__GSPROJECT__";

/// Reserved function holding the lockfile
pub const LOCK_FUNCTION: &str = "__LOCK__";

/// Default text for an undocumented argument
pub const DEFAULT_ARGUMENT_DESCRIPTION: &str = "No description provided.";

/// Default example for an undocumented argument
pub const DEFAULT_ARGUMENT_EXAMPLE: &str = "No example provided.";

/// Check if a function name is reserved for bookkeeping
pub fn is_reserved(name: &str) -> bool {
    name == PROJECT_FUNCTION || name == LOCK_FUNCTION
}

/// Documentation for one argument of a named function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentMetadata {
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_example")]
    pub example: String,
}

fn default_description() -> String {
    DEFAULT_ARGUMENT_DESCRIPTION.to_string()
}

fn default_example() -> String {
    DEFAULT_ARGUMENT_EXAMPLE.to_string()
}

impl Default for ArgumentMetadata {
    fn default() -> Self {
        Self {
            description: default_description(),
            example: default_example(),
        }
    }
}

/// A named function: a formula body plus its documentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    /// Formula text, usually starting with `=`
    pub definition: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Argument names in call order
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub argument_metadata: IndexMap<String, ArgumentMetadata>,
}

impl FunctionDefinition {
    /// Create a function without arguments
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            description: None,
            arguments: Vec::new(),
            argument_metadata: IndexMap::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append an argument with default documentation
    pub fn with_argument(mut self, name: impl Into<String>) -> Self {
        self.arguments.push(name.into());
        self
    }

    /// Metadata for `arg`, falling back to the defaults
    pub fn argument_info(&self, arg: &str) -> ArgumentMetadata {
        self.argument_metadata.get(arg).cloned().unwrap_or_default()
    }

    /// Copy of this function under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

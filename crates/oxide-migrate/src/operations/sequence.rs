//! Sequence operations.

use oxide_model::reflect::PrimitiveType;
use serde::{Deserialize, Serialize};

/// The options a sequence can be altered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceOptions {
    pub increment_by: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cyclic: bool,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            increment_by: 1,
            min_value: None,
            max_value: None,
            cyclic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateSequenceOperation {
    pub name: String,
    pub schema: Option<String>,
    pub clr_type: PrimitiveType,
    pub start_value: i64,
    pub options: SequenceOptions,
}

impl Default for CreateSequenceOperation {
    fn default() -> Self {
        Self {
            name: String::new(),
            schema: None,
            clr_type: PrimitiveType::Int64,
            start_value: 1,
            options: SequenceOptions::default(),
        }
    }
}

impl CreateSequenceOperation {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlterSequenceOperation {
    pub name: String,
    pub schema: Option<String>,
    pub options: SequenceOptions,
    pub old_options: SequenceOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropSequenceOperation {
    pub name: String,
    pub schema: Option<String>,
}

/// Renames a sequence and/or moves it to another schema, with the same
/// `new_schema` semantics as a table rename.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameSequenceOperation {
    pub name: String,
    pub schema: Option<String>,
    pub new_name: Option<String>,
    pub new_schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartSequenceOperation {
    pub name: String,
    pub schema: Option<String>,
    pub start_value: i64,
}

impl Default for RestartSequenceOperation {
    fn default() -> Self {
        Self {
            name: String::new(),
            schema: None,
            start_value: 1,
        }
    }
}

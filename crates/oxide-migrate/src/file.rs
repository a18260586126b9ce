//! Operation files.
//!
//! An operation file is a JSON array of operations, each tagged with its
//! `type`:
//!
//! ```json
//! [
//!   { "type": "EnsureSchema", "name": "sales" },
//!   { "type": "DropColumn", "table": "Widgets", "name": "Legacy" }
//! ]
//! ```

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{MigrationError, Result};
use crate::operations::MigrationOperation;

/// Reads the operations of a JSON operation file.
///
/// # Errors
///
/// Returns [`MigrationError::Io`] when the file cannot be read and
/// [`MigrationError::Parse`] when it is not a valid operation list.
pub fn load_operations(path: impl AsRef<Path>) -> Result<Vec<MigrationOperation>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let operations: Vec<MigrationOperation> =
        serde_json::from_str(&content).map_err(|source| MigrationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), count = operations.len(), "Loaded operations");
    Ok(operations)
}

/// Writes `operations` as a pretty-printed operation file.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_operations(path: impl AsRef<Path>, operations: &[MigrationOperation]) -> Result<()> {
    let content = serde_json::to_string_pretty(operations)?;
    fs::write(path, content)?;
    Ok(())
}

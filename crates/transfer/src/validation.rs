use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a transfer id is usable as a working file's base name.
///
/// Rejects:
/// - Empty ids
/// - Ids containing path separators or NUL bytes
/// - `.` and `..`
/// - Anything that is not exactly one normal path component
pub fn validate_transfer_id(id: &str) -> Result<(), TransferError> {
    if id.is_empty() {
        return Err(TransferError::InvalidTransferId("empty id".into()));
    }

    if id.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidTransferId(format!(
            "separator not allowed: {id}"
        )));
    }

    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(TransferError::InvalidTransferId(format!(
            "parent directory not allowed: {id}"
        ))),
        (Some(Component::CurDir), _) => Err(TransferError::InvalidTransferId(format!(
            "current directory not allowed: {id}"
        ))),
        _ => Err(TransferError::InvalidTransferId(format!(
            "not a single file name: {id}"
        ))),
    }
}

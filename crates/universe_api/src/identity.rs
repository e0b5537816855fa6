//! Write-once identity slot for loaded server definitions.
//!
//! The slot is created together with a single [`IdentityAssigner`]. The
//! definition side only ever sees the read half; the assigner is handed to the
//! bootstrap by the loader and is the only way to write the value.

use crate::types::ServerId;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Errors raised by identity assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The slot already holds an identity; the new one was not stored.
    #[error("server identity is already assigned ({current}); refusing to replace it with {rejected}")]
    AlreadyAssigned {
        current: ServerId,
        rejected: ServerId,
    },
}

/// Read half of a definition's identity.
#[derive(Debug, Clone)]
pub struct IdentitySlot {
    cell: Arc<OnceLock<ServerId>>,
}

impl IdentitySlot {
    /// Creates an empty slot and the only writer for it.
    pub(crate) fn new() -> (Self, IdentityAssigner) {
        let cell = Arc::new(OnceLock::new());
        (
            Self { cell: cell.clone() },
            IdentityAssigner { cell },
        )
    }

    /// The assigned identity, or `None` before the bootstrap assigned one.
    pub fn get(&self) -> Option<ServerId> {
        self.cell.get().copied()
    }

    pub fn is_assigned(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Sole writer of an [`IdentitySlot`].
///
/// Deliberately not `Clone`: whoever holds it is the bootstrap authority for
/// that definition.
#[derive(Debug)]
pub struct IdentityAssigner {
    cell: Arc<OnceLock<ServerId>>,
}

impl IdentityAssigner {
    /// Stores `id` in the slot.
    ///
    /// Succeeds only for the first call. Later calls leave the stored value
    /// untouched and report both identities.
    pub fn assign(&self, id: ServerId) -> Result<ServerId, IdentityError> {
        match self.cell.set(id) {
            Ok(()) => Ok(id),
            Err(rejected) => Err(IdentityError::AlreadyAssigned {
                current: self.cell.get().copied().unwrap_or(rejected),
                rejected,
            }),
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.cell.get().is_some()
    }
}

//! Per-call identifier allocation
//!
//! The identifier correlates the in-app call with the native call UI record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Hyphenated lower-case, the form native call UIs expect
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for CallId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Hands out one identifier per call
#[derive(Debug, Default)]
pub struct CallIdAllocator {
    current: Option<CallId>,
    previous: Option<CallId>,
}

impl CallIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current identifier, allocating one if none is active
    pub fn get_or_create(&mut self) -> CallId {
        if let Some(id) = self.current {
            return id;
        }

        let mut id = CallId(Uuid::new_v4());
        while Some(id) == self.previous {
            id = CallId(Uuid::new_v4());
        }

        self.current = Some(id);
        id
    }

    /// Current identifier without allocating
    pub fn current(&self) -> Option<CallId> {
        self.current
    }

    /// Drop the current identifier. The next call gets a fresh one.
    pub fn clear(&mut self) -> Option<CallId> {
        let cleared = self.current.take();
        if cleared.is_some() {
            self.previous = cleared;
        }
        cleared
    }
}

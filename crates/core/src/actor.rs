//! Actor context threaded through every workflow call.
//!
//! Authentication happens elsewhere; by the time a workflow engine is
//! invoked the caller identity is already resolved. There is deliberately
//! no ambient "current user" anywhere in this workspace; attribution is
//! always an explicit parameter.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Resolved caller identity for movement/transition attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    /// Human-readable name, carried onto audit entries.
    pub display_name: String,
}

impl Actor {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }
}

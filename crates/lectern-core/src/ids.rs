// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record identifiers.
//!
//! The remote backend assigns UUIDs. Records created while offline carry a
//! placeholder (`local-` followed by 32 hex digits) until a push succeeds and
//! the placeholder is rewritten to the backend-assigned identifier.

use uuid::Uuid;

/// Prefix marking a locally generated placeholder identifier.
pub const PLACEHOLDER_PREFIX: &str = "local-";

/// Generate a fresh placeholder identifier.
pub fn new_placeholder_id() -> String {
    format!("{PLACEHOLDER_PREFIX}{}", Uuid::new_v4().simple())
}

/// True if `id` was generated locally and never acknowledged by the backend.
pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

/// True if `id` is in the backend's native (UUID) format.
pub fn is_remote_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// True if a record with this identifier still has to be pushed.
pub fn needs_push(id: &str) -> bool {
    is_placeholder(id) || !is_remote_id(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_not_a_remote_id() {
        let id = new_placeholder_id();
        assert!(is_placeholder(&id));
        assert!(!is_remote_id(&id));
        assert!(needs_push(&id));
        assert_eq!(id.len(), PLACEHOLDER_PREFIX.len() + 32);
    }

    #[test]
    fn uuid_is_synced() {
        let id = Uuid::new_v4().to_string();
        assert!(is_remote_id(&id));
        assert!(!needs_push(&id));
    }

    #[test]
    fn legacy_numeric_ids_need_push() {
        // Rows written by older builds used timestamps as ids.
        assert!(needs_push("1718000000000"));
        assert!(!is_placeholder("1718000000000"));
    }
}

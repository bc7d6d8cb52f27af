// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local persistence for the Lectern attendance tracker.
//!
//! Three interchangeable drivers implement [`lectern_core::StorageDriver`]:
//! a WAL-mode SQLite file with embedded migrations and optional column
//! encryption, an embedded object store, and a flat single-blob fallback.
//! [`StorageManager`] selects between them and fails over on error.

pub mod crypto;
pub mod database;
pub mod drivers;
pub mod manager;
pub mod migrations;
pub mod rows;

pub use crypto::FieldCipher;
pub use database::{Database, DatabaseOptions};
pub use drivers::embedded::{EmbeddedDriver, MemoryObjectStore, ObjectOp, ObjectStore};
pub use drivers::flat::{BlobStore, FileBlobStore, FlatDriver, MemoryBlobStore};
pub use drivers::sqlite::SqliteDriver;
pub use manager::StorageManager;

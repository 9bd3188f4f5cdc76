//! On-disk music library.
//!
//! Retrieved media lives once in a shared storage pool; each playlist is a
//! directory of symlinks into that pool.
//!
//! # Storage Layout
//!
//! ```text
//! <data>/msync/storage/          # shared pool
//! ~/Music/
//! └── <playlist title>/          # symlinks only
//! ```

pub mod layout;

pub use layout::{directory_name, LayoutError, LibraryLayout, LinkOutcome};

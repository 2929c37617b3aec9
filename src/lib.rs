//! SongFS: Self-Filing Song Filesystem
//!
//! Songs written into `/ALL` are filed automatically by the `Artist:`,
//! `Album:` and `Title:` lines at the top of their content:
//! - Catalog (the in-memory engine: node tree, projections, lifecycle)
//! - Song Drive (FUSE loop - translates kernel requests into catalog calls)
//! - Config (mount options and statfs figures)

pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod song_drive;
pub mod state;

pub use catalog::{Catalog, DirEntry, WriteOutcome, ALL_PATH, CATEGORY_ROOTS};
pub use config::{Config, StatfsConfig};
pub use error::{CatalogError, Result};
pub use song_drive::SongDrive;
pub use state::{GlobalState, SharedState};

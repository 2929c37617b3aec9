// FILE: src/state.rs

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::core::inode_store::InodeStore;
use crate::core::permissions::Identity;

/// Global shared state accessible by the FUSE loop
pub struct GlobalState {
    /// The song tree. Mutations need the write lock on the whole state.
    pub catalog: Catalog,

    /// Inode <-> path table for the kernel
    pub inode_store: InodeStore,

    /// File handle -> canonical path, for handles whose song was forked by a
    /// rewrite. Later writes on the handle follow the new song.
    pub redirects: HashMap<u64, String>,
}

/// Shared state wrapper for easy cloning and sharing
pub type SharedState = Arc<RwLock<GlobalState>>;

impl GlobalState {
    pub fn new(identity: Identity, config: &Config) -> Self {
        Self {
            catalog: Catalog::new(identity, config.statfs).with_max_file_size(config.max_file_size),
            inode_store: InodeStore::new(),
            redirects: HashMap::new(),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}

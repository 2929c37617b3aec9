// FILE: src/core/inode_store.rs
//! Inode table for the kernel bridge.
//!
//! The catalog is addressed by path, the kernel by inode. Inodes are handed
//! out lazily the first time a path is looked up and stay stable until the
//! path is unlinked, renamed away, or torn down.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub const INODE_ROOT: u64 = 1;

pub struct InodeStore {
    paths: RwLock<HashMap<String, u64>>,
    inodes: RwLock<HashMap<u64, String>>,
    next_inode: RwLock<u64>,
}

impl Default for InodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeStore {
    pub fn new() -> Self {
        let mut paths = HashMap::new();
        let mut inodes = HashMap::new();
        paths.insert("/".to_string(), INODE_ROOT);
        inodes.insert(INODE_ROOT, "/".to_string());

        Self {
            paths: RwLock::new(paths),
            inodes: RwLock::new(inodes),
            next_inode: RwLock::new(INODE_ROOT + 1),
        }
    }

    pub fn get_or_create_inode(&self, path: &str) -> u64 {
        {
            let map = self.paths.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&id) = map.get(path) {
                return id;
            }
        }

        let mut map = self.paths.write().unwrap_or_else(PoisonError::into_inner);
        let mut inodes = self.inodes.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = self.next_inode.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(&id) = map.get(path) {
            return id;
        }

        let id = *next;
        *next += 1;

        map.insert(path.to_string(), id);
        inodes.insert(id, path.to_string());
        tracing::trace!("[InodeStore] {} -> inode {}", path, id);

        id
    }

    pub fn get_path(&self, inode: u64) -> Option<String> {
        self.inodes.read().unwrap_or_else(PoisonError::into_inner).get(&inode).cloned()
    }

    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.paths.read().unwrap_or_else(PoisonError::into_inner).get(path).copied()
    }

    pub fn forget(&self, path: &str) {
        if path == "/" { return; }

        let mut map = self.paths.write().unwrap_or_else(PoisonError::into_inner);
        let mut inodes = self.inodes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = map.remove(path) {
            inodes.remove(&id);
        }
    }

    /// Forgets `prefix` and every path below it.
    pub fn forget_subtree(&self, prefix: &str) {
        let nested = format!("{}/", prefix.trim_end_matches('/'));

        let mut map = self.paths.write().unwrap_or_else(PoisonError::into_inner);
        let mut inodes = self.inodes.write().unwrap_or_else(PoisonError::into_inner);
        map.retain(|path, id| {
            let doomed = path != "/" && (path == prefix || path.starts_with(&nested));
            if doomed {
                inodes.remove(id);
            }
            !doomed
        });
    }

    /// Moves the inode of `old` to `new`, dropping whatever `new` had.
    pub fn rename(&self, old: &str, new: &str) {
        let mut map = self.paths.write().unwrap_or_else(PoisonError::into_inner);
        let mut inodes = self.inodes.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(replaced) = map.remove(new) {
            inodes.remove(&replaced);
        }
        if let Some(id) = map.remove(old) {
            map.insert(new.to_string(), id);
            inodes.insert(id, new.to_string());
        }
    }
}

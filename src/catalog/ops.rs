// FILE: src/catalog/ops.rs
//! Filesystem operations invoked by the kernel bridge.

use std::time::SystemTime;

use super::{Catalog, ALL_PATH};
use crate::config::StatfsConfig;
use crate::core::node::{join_path, Attributes, NodeKind, SongState, Xattrs};
use crate::core::tags::extract_tags;
use crate::error::{CatalogError, Result};

/// Result of a write: how much was taken and which canonical entry took it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub written: usize,
    /// Differs from the requested path when a pending rewrite forked a new song.
    pub path: String,
    /// Category entries the new header no longer places the song in.
    pub dropped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

impl Catalog {
    /// Creates an empty song under `/ALL` and returns a file handle.
    ///
    /// An existing entry of the same name is left untouched.
    pub fn create(&mut self, path: &str) -> Result<u64> {
        let name = Self::canonical_name(path)?;
        if self.canonical_song(name).is_err() {
            self.insert_canonical(name)?;
            tracing::debug!("[Catalog] Created {}", path);
        }
        Ok(self.next_handle())
    }

    pub fn open(&mut self, path: &str) -> Result<u64> {
        if self.root.file(path).is_none() {
            return Err(CatalogError::NotFound(path.to_string()));
        }
        Ok(self.next_handle())
    }

    pub fn write(&mut self, path: &str, data: &[u8], offset: u64) -> Result<WriteOutcome> {
        let requested = Self::canonical_name(path)?;
        let mut id = self.canonical_song(requested)?;
        let mut name = requested.to_string();

        let end = offset.checked_add(data.len() as u64);
        self.check_size(path, end)?;

        if self.song_mut(id)?.state == SongState::PendingRewrite {
            self.song_mut(id)?.state = SongState::Stable;
            name = self.fresh_name(requested);
            id = self.insert_canonical(&name)?;
            tracing::debug!("[Catalog] Rewrite of {} stored as {}", requested, name);
        }

        let song = self.song_mut(id)?;
        song.splice(offset as usize, data);
        song.state = SongState::Stable;

        let written = data.len() as u64;
        self.root.attrs.size += written;
        self.inbox_mut()?.attrs.size += written;

        let dropped = self.categorize(&name, id)?;

        Ok(WriteOutcome { written: data.len(), path: join_path(ALL_PATH, &name), dropped })
    }

    /// Rejects a content length past `max_file_size`; `None` is an overflowed end.
    fn check_size(&self, path: &str, len: Option<u64>) -> Result<()> {
        match len {
            Some(len) if len <= self.max_file_size => Ok(()),
            _ => Err(CatalogError::TooLarge(format!(
                "{} would exceed {} bytes",
                path, self.max_file_size
            ))),
        }
    }

    /// Re-reads the song header and (re)projects the song. A malformed header
    /// leaves the song under `/ALL` only. Returns the category entries removed.
    fn categorize(&mut self, name: &str, id: u64) -> Result<Vec<String>> {
        let parsed = match self.songs.get(id) {
            Some(song) => extract_tags(&song.content),
            None => return Err(CatalogError::State(format!("song {} has no content", id))),
        };

        match parsed {
            Ok(tags) => self.project(name, id, &tags),
            Err(e) => {
                tracing::debug!("[Catalog] {} left uncategorized: {}", name, e);
                self.unproject(name, id)
            }
        }
    }

    pub fn read(&self, path: &str, size: usize, offset: u64) -> Result<&[u8]> {
        let file = self
            .root
            .file(path)
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))?;
        let song = self
            .songs
            .get(file.song)
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))?;
        Ok(song.slice(offset as usize, size))
    }

    /// Truncating a non-empty song to zero only marks it for rewrite; its
    /// content stays until the next write decides what happens to it.
    pub fn truncate(&mut self, path: &str, length: u64) -> Result<()> {
        let name = Self::canonical_name(path)?;
        let id = self.canonical_song(name)?;
        self.check_size(path, Some(length))?;
        let song = self.song_mut(id)?;

        if length == 0 && !song.content.is_empty() {
            song.state = SongState::PendingRewrite;
            tracing::debug!("[Catalog] {} pending rewrite", path);
            return Ok(());
        }

        song.resize(length as usize);
        Ok(())
    }

    /// Songs are never symlinks; this hands back the content as-is.
    pub fn readlink(&self, path: &str) -> Result<&[u8]> {
        self.content(path)
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))
    }

    /// Renames the canonical entry and every projection of it. Categories
    /// are not recomputed. Returns the (old, new) path of every moved entry.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<Vec<(String, String)>> {
        let old_name = Self::canonical_name(old)?;
        let new_name = Self::canonical_name(new)?;
        let id = self.canonical_song(old_name)?;

        if old_name == new_name {
            return Ok(Vec::new());
        }
        if self.canonical_song(new_name).is_ok() {
            self.unlink(new)?;
        }

        let dirs = self.song_mut(id)?.paths.clone();
        let mut moved = Vec::with_capacity(dirs.len());
        for dir_path in dirs {
            if let Some(dir) = self.root.dir_mut(&dir_path) {
                if let Some(mut file) = dir.remove_file(old_name) {
                    file.attrs.ctime = SystemTime::now();
                    dir.insert_file(new_name, file);
                    moved.push((join_path(&dir_path, old_name), join_path(&dir_path, new_name)));
                }
            }
        }

        tracing::debug!("[Catalog] Renamed {} -> {}", old, new);
        Ok(moved)
    }

    /// Removes the song from `/ALL` and from every category. Returns the
    /// paths of the removed entries.
    pub fn unlink(&mut self, path: &str) -> Result<Vec<String>> {
        let name = Self::canonical_name(path)?;
        let id = self.canonical_song(name)?;
        let song = self
            .songs
            .remove(id)
            .ok_or_else(|| CatalogError::State(format!("song {} has no content", id)))?;

        let mut removed = Vec::with_capacity(song.paths.len());
        for dir_path in &song.paths {
            if let Some(dir) = self.root.dir_mut(dir_path) {
                if dir.remove_file(name).is_some() {
                    removed.push(join_path(dir_path, name));
                }
            }
        }
        if self.inbox_mut()?.remove_file(name).is_some() {
            removed.push(path.to_string());
        }

        tracing::debug!("[Catalog] Unlinked {}", path);
        self.teardown_if_empty();
        Ok(removed)
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let dir = self
            .root
            .dir(path)
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))?;

        let mut entries = Vec::with_capacity(dir.files.len() + dir.dirs.len() + 2);
        for special in [".", ".."] {
            entries.push(DirEntry { name: special.to_string(), kind: NodeKind::Directory });
        }
        entries.extend(dir.files.keys().map(|name| DirEntry { name: name.clone(), kind: NodeKind::File }));
        entries.extend(dir.dirs.keys().map(|name| DirEntry { name: name.clone(), kind: NodeKind::Directory }));
        Ok(entries)
    }

    pub fn getattr(&self, path: &str) -> Result<Attributes> {
        if let Some(file) = self.root.file(path) {
            let mut attrs = file.attrs.clone();
            if let Some(song) = self.songs.get(file.song) {
                attrs.size = song.size();
                attrs.blocks = song.blocks();
                attrs.mtime = song.modified;
            }
            return Ok(attrs);
        }
        self.root
            .dir(path)
            .map(|dir| dir.attrs.clone())
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))
    }

    fn xattrs(&self, path: &str) -> Result<&Xattrs> {
        if let Some(file) = self.root.file(path) {
            return Ok(&file.xattrs);
        }
        self.root
            .dir(path)
            .map(|dir| &dir.xattrs)
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))
    }

    fn xattrs_mut(&mut self, path: &str) -> Result<&mut Xattrs> {
        if self.root.file(path).is_some() {
            return self
                .root
                .file_mut(path)
                .map(|file| &mut file.xattrs)
                .ok_or_else(|| CatalogError::NotFound(path.to_string()));
        }
        self.root
            .dir_mut(path)
            .map(|dir| &mut dir.xattrs)
            .ok_or_else(|| CatalogError::NotFound(path.to_string()))
    }

    /// Absent keys read as an empty value.
    pub fn getxattr(&self, path: &str, name: &str) -> Result<Vec<u8>> {
        Ok(self.xattrs(path)?.get(name).cloned().unwrap_or_default())
    }

    pub fn setxattr(&mut self, path: &str, name: &str, value: &[u8]) -> Result<()> {
        self.xattrs_mut(path)?.insert(name.to_string(), value.to_vec());
        Ok(())
    }

    pub fn listxattr(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.xattrs(path)?.keys().cloned().collect())
    }

    pub fn removexattr(&mut self, path: &str, name: &str) -> Result<()> {
        self.xattrs_mut(path)?.remove(name);
        Ok(())
    }

    pub fn statfs(&self) -> StatfsConfig {
        self.statfs
    }

    pub fn destroy(&mut self) {
        if self.songs.is_empty() {
            tracing::info!("[Catalog] Unmounted empty");
        } else {
            tracing::info!("[Catalog] Unmounted with {} songs, nothing to flush", self.songs.len());
        }
    }
}

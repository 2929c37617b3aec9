// FILE: src/catalog/mod.rs
//! The Catalog: the in-memory song filesystem engine.
//!
//! Songs are created and written under `/ALL`. Each write re-reads the song
//! header and mirrors the song into `/by Artist`, `/by Album` and `/by Title`.
//! Everything outside `/ALL` is synthesized and read-only.
//!
//! All operations are path based. The engine holds no locks of its own:
//! reads take `&self`, mutations `&mut self`, and the owner (see
//! [`crate::state::GlobalState`]) serializes them.

mod lifecycle;
mod ops;
mod projection;
#[cfg(test)]
mod tests;

pub use ops::{DirEntry, WriteOutcome};

use crate::config::{StatfsConfig, DEFAULT_MAX_FILE_SIZE};
use crate::core::node::{split_path, Directory, File, Song, SongArena, SongId, INBOX_MODE, ROOT_MODE};
use crate::core::permissions::Identity;
use crate::error::{CatalogError, Result};

pub const ALL_DIR: &str = "ALL";
pub const ALL_PATH: &str = "/ALL";
pub const CATEGORY_ROOTS: [&str; 3] = ["by Artist", "by Album", "by Title"];

pub struct Catalog {
    root: Directory,
    songs: SongArena,
    identity: Identity,
    statfs: StatfsConfig,
    max_file_size: u64,
    next_fh: u64,
    /// True while the category roots are absent.
    is_empty: bool,
}

impl Catalog {
    /// A catalog holding `/` and an empty `/ALL`.
    pub fn new(identity: Identity, statfs: StatfsConfig) -> Self {
        let mut root = Directory::new(ROOT_MODE, identity);
        root.add_dir(ALL_DIR, INBOX_MODE, identity);

        Self {
            root,
            songs: SongArena::new(),
            identity,
            statfs,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            next_fh: 0,
            is_empty: true,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    /// Content of the song behind `path`, whichever of its paths is used.
    pub fn content(&self, path: &str) -> Option<&[u8]> {
        let file = self.root.file(path)?;
        self.songs.get(file.song).map(|song| song.content.as_slice())
    }

    /// Directories currently holding an entry for the song at `path`.
    pub fn paths_of(&self, path: &str) -> Option<&[String]> {
        let file = self.root.file(path)?;
        self.songs.get(file.song).map(|song| song.paths.as_slice())
    }

    fn next_handle(&mut self) -> u64 {
        self.next_fh += 1;
        self.next_fh
    }

    fn inbox(&self) -> Option<&Directory> {
        self.root.dirs.get(ALL_DIR)
    }

    fn inbox_mut(&mut self) -> Result<&mut Directory> {
        self.root
            .dirs
            .get_mut(ALL_DIR)
            .ok_or_else(|| CatalogError::State("/ALL is missing".into()))
    }

    /// The file name of `path` when it names an entry directly under `/ALL`.
    fn canonical_name(path: &str) -> Result<&str> {
        let (parent, name) = split_path(path)?;
        if parent != ALL_PATH {
            return Err(CatalogError::ReadOnlyViolation(path.to_string()));
        }
        Ok(name)
    }

    fn canonical_song(&self, name: &str) -> Result<SongId> {
        self.inbox()
            .and_then(|dir| dir.files.get(name))
            .map(|file| file.song)
            .ok_or_else(|| CatalogError::NotFound(format!("{}/{}", ALL_PATH, name)))
    }

    fn song_mut(&mut self, id: SongId) -> Result<&mut Song> {
        self.songs
            .get_mut(id)
            .ok_or_else(|| CatalogError::State(format!("song {} has no content", id)))
    }

    /// Allocates an empty song and its canonical entry.
    fn insert_canonical(&mut self, name: &str) -> Result<SongId> {
        if self.canonical_song(name).is_ok() {
            return Err(CatalogError::NameCollision(format!("{}/{}", ALL_PATH, name)));
        }
        let id = self.songs.insert(Song::new(vec![ALL_PATH.to_string()]));
        let file = File::new(id, self.identity);
        self.inbox_mut()?.insert_file(name, file);
        Ok(id)
    }

    /// `<name>_<n>` for the smallest `n >= 2` not present under `/ALL`.
    fn fresh_name(&self, name: &str) -> String {
        let taken = |candidate: &str| {
            self.inbox()
                .map(|dir| dir.files.contains_key(candidate))
                .unwrap_or(false)
        };
        let mut n = 2u64;
        loop {
            let candidate = format!("{}_{}", name, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

// FILE: src/core/node.rs
//! Node Store: the in-memory tree of directories and files.
//!
//! Song content lives in a [`SongArena`]; every file entry (the canonical one
//! under `/ALL` and each categorized projection) only holds the [`SongId`] of
//! its song, so all paths of a song always read the same bytes.

use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

use crate::core::permissions::Identity;
use crate::error::{CatalogError, Result};

pub const BLOCK_SIZE: u64 = 512;

pub const FILE_MODE: u32 = 0o100666;
pub const ROOT_MODE: u32 = 0o040555;
/// `/ALL` is the only writable directory.
pub const INBOX_MODE: u32 = 0o040777;
pub const CATEGORY_MODE: u32 = 0o040555;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

pub type SongId = u64;

/// Extended attribute bag attached to a single node.
pub type Xattrs = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// The metadata record reported by `getattr`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    pub size: u64,
    pub blocks: u64,
    pub mode: u32,
    pub nlink: u32,
    pub crtime: SystemTime,
    pub ctime: SystemTime,
    pub mtime: SystemTime,
    pub atime: SystemTime,
    pub uid: u32,
    pub gid: u32,
}

impl Attributes {
    pub fn new(mode: u32, nlink: u32, identity: Identity) -> Self {
        let now = SystemTime::now();
        Self {
            size: 0,
            blocks: 0,
            mode,
            nlink,
            crtime: now,
            ctime: now,
            mtime: now,
            atime: now,
            uid: identity.uid,
            gid: identity.gid,
        }
    }

    pub fn kind(&self) -> NodeKind {
        if self.mode & S_IFMT == S_IFDIR {
            NodeKind::Directory
        } else {
            NodeKind::File
        }
    }

    pub fn perm(&self) -> u16 {
        (self.mode & 0o7777) as u16
    }
}

/// A directory entry pointing at a song.
#[derive(Debug, Clone)]
pub struct File {
    pub song: SongId,
    pub attrs: Attributes,
    pub xattrs: Xattrs,
}

impl File {
    pub fn new(song: SongId, identity: Identity) -> Self {
        Self {
            song,
            attrs: Attributes::new(FILE_MODE, 1, identity),
            xattrs: Xattrs::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Directory {
    pub files: HashMap<String, File>,
    pub dirs: HashMap<String, Directory>,
    pub attrs: Attributes,
    pub xattrs: Xattrs,
}

impl Directory {
    pub fn new(mode: u32, identity: Identity) -> Self {
        Self {
            files: HashMap::new(),
            dirs: HashMap::new(),
            attrs: Attributes::new(mode, 2, identity),
            xattrs: Xattrs::new(),
        }
    }

    /// Returns the named subdirectory, creating it with `mode` if absent.
    pub fn add_dir(&mut self, name: &str, mode: u32, identity: Identity) -> &mut Directory {
        if !self.dirs.contains_key(name) {
            self.attrs.nlink += 1;
            self.attrs.mtime = SystemTime::now();
        }
        self.dirs.entry(name.to_string()).or_insert_with(|| Directory::new(mode, identity))
    }

    pub fn remove_dir(&mut self, name: &str) -> Option<Directory> {
        let removed = self.dirs.remove(name);
        if removed.is_some() {
            self.attrs.nlink = self.attrs.nlink.saturating_sub(1);
            self.attrs.mtime = SystemTime::now();
        }
        removed
    }

    pub fn insert_file(&mut self, name: &str, file: File) -> Option<File> {
        self.attrs.mtime = SystemTime::now();
        self.files.insert(name.to_string(), file)
    }

    pub fn remove_file(&mut self, name: &str) -> Option<File> {
        let removed = self.files.remove(name);
        if removed.is_some() {
            self.attrs.mtime = SystemTime::now();
        }
        removed
    }

    pub fn dir(&self, path: &str) -> Option<&Directory> {
        segments(path).try_fold(self, |location, segment| location.dirs.get(segment))
    }

    pub fn dir_mut(&mut self, path: &str) -> Option<&mut Directory> {
        segments(path).try_fold(self, |location, segment| location.dirs.get_mut(segment))
    }

    pub fn file(&self, path: &str) -> Option<&File> {
        let (parent, name) = split_path(path).ok()?;
        self.dir(parent)?.files.get(name)
    }

    pub fn file_mut(&mut self, path: &str) -> Option<&mut File> {
        let (parent, name) = split_path(path).ok()?;
        self.dir_mut(parent)?.files.get_mut(name)
    }
}

/// Lifecycle of a song's canonical entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongState {
    /// Allocated by `create`, never written.
    Created,
    Stable,
    /// Truncated to zero while holding content: the next write is a new song.
    PendingRewrite,
}

/// Content and bookkeeping shared by every path of one song.
#[derive(Debug, Clone)]
pub struct Song {
    pub content: Vec<u8>,
    pub modified: SystemTime,
    /// Directories currently holding an entry for this song, `/ALL` last.
    pub paths: Vec<String>,
    pub state: SongState,
}

impl Song {
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            content: Vec::new(),
            modified: SystemTime::now(),
            paths,
            state: SongState::Created,
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn blocks(&self) -> u64 {
        self.size() / BLOCK_SIZE
    }

    /// Writes `data` at `offset`, zero-filling any gap past the current end.
    pub fn splice(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        if self.content.len() < end {
            self.content.resize(end, 0);
        }
        self.content[offset..end].copy_from_slice(data);
        self.modified = SystemTime::now();
    }

    pub fn resize(&mut self, len: usize) {
        self.content.resize(len, 0);
        self.modified = SystemTime::now();
    }

    /// The bytes in `[offset, offset + size)`, clipped to the content.
    pub fn slice(&self, offset: usize, size: usize) -> &[u8] {
        let start = offset.min(self.content.len());
        let end = start.saturating_add(size).min(self.content.len());
        &self.content[start..end]
    }
}

#[derive(Debug, Default)]
pub struct SongArena {
    songs: HashMap<SongId, Song>,
    next_id: SongId,
}

impl SongArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, song: Song) -> SongId {
        self.next_id += 1;
        self.songs.insert(self.next_id, song);
        self.next_id
    }

    pub fn get(&self, id: SongId) -> Option<&Song> {
        self.songs.get(&id)
    }

    pub fn get_mut(&mut self, id: SongId) -> Option<&mut Song> {
        self.songs.get_mut(&id)
    }

    pub fn remove(&mut self, id: SongId) -> Option<Song> {
        self.songs.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

/// Non-empty segments of a slash separated path. `/` yields nothing.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Splits `/a/b/name` into (`/a/b`, `name`).
pub fn split_path(path: &str) -> Result<(&str, &str)> {
    let (parent, name) = path
        .rsplit_once('/')
        .ok_or_else(|| CatalogError::InvalidPath(path.to_string()))?;
    if name.is_empty() {
        return Err(CatalogError::InvalidPath(path.to_string()));
    }
    Ok((if parent.is_empty() { "/" } else { parent }, name))
}

pub fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

// FILE: src/song_drive.rs
//! Song Drive: The Synchronous FUSE Loop
//!
//! Translates inode-based kernel requests into path-based catalog calls.
//! Every request takes the state lock once: read requests share it, anything
//! that changes the tree takes it exclusively.

use std::ffi::OsStr;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr, Request, TimeOrNow,
};

use crate::catalog::CATEGORY_ROOTS;
use crate::core::inode_store::INODE_ROOT;
use crate::core::node::{join_path, split_path, Attributes, NodeKind, BLOCK_SIZE};
use crate::error::{CatalogError, Result};
use crate::state::{GlobalState, SharedState};

const NAME_MAX: u32 = 255;

pub struct SongDrive {
    pub state: SharedState,
    ttl: Duration,
}

impl SongDrive {
    pub fn new(state: SharedState, ttl: Duration) -> Self {
        Self { state, ttl }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, GlobalState>> {
        self.state.read().map_err(|_| CatalogError::State("Poisoned lock".into()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, GlobalState>> {
        self.state.write().map_err(|_| CatalogError::State("Poisoned lock".into()))
    }

    fn path_of(state: &GlobalState, ino: u64) -> Result<String> {
        state
            .inode_store
            .get_path(ino)
            .ok_or_else(|| CatalogError::NotFound(format!("inode {}", ino)))
    }

    fn child_path(state: &GlobalState, parent: u64, name: &OsStr) -> Result<String> {
        let name = utf8(name)?;
        Ok(join_path(&Self::path_of(state, parent)?, name))
    }

    /// Path a handle currently writes to: its redirect if a rewrite forked
    /// the song, else the inode's own path.
    fn handle_path(state: &GlobalState, ino: u64, fh: u64) -> Result<String> {
        match state.redirects.get(&fh) {
            Some(path) => Ok(path.clone()),
            None => Self::path_of(state, ino),
        }
    }

    fn attr_for(state: &GlobalState, path: &str) -> Result<FileAttr> {
        let attrs = state.catalog.getattr(path)?;
        let ino = state.inode_store.get_or_create_inode(path);
        Ok(file_attr(ino, &attrs))
    }

    fn do_lookup(&self, parent: u64, name: &OsStr) -> Result<FileAttr> {
        let state = self.read_state()?;
        let path = Self::child_path(&state, parent, name)?;
        Self::attr_for(&state, &path)
    }

    fn do_getattr(&self, ino: u64) -> Result<FileAttr> {
        let state = self.read_state()?;
        let path = Self::path_of(&state, ino)?;
        Self::attr_for(&state, &path)
    }

    fn do_setattr(&self, ino: u64, size: Option<u64>) -> Result<FileAttr> {
        let mut state = self.write_state()?;
        let path = Self::path_of(&state, ino)?;
        if let Some(size) = size {
            state.catalog.truncate(&path, size)?;
        }
        Self::attr_for(&state, &path)
    }

    fn do_create(&self, parent: u64, name: &OsStr) -> Result<(FileAttr, u64)> {
        let mut state = self.write_state()?;
        let path = Self::child_path(&state, parent, name)?;
        let fh = state.catalog.create(&path)?;
        Ok((Self::attr_for(&state, &path)?, fh))
    }

    fn do_open(&self, ino: u64) -> Result<u64> {
        let mut state = self.write_state()?;
        let path = Self::path_of(&state, ino)?;
        state.catalog.open(&path)
    }

    fn do_read(&self, ino: u64, fh: u64, offset: i64, size: u32) -> Result<Vec<u8>> {
        let state = self.read_state()?;
        let path = Self::handle_path(&state, ino, fh)?;
        let data = state.catalog.read(&path, size as usize, offset.max(0) as u64)?;
        Ok(data.to_vec())
    }

    fn do_write(&self, ino: u64, fh: u64, offset: i64, data: &[u8]) -> Result<usize> {
        let mut state = self.write_state()?;
        let path = Self::handle_path(&state, ino, fh)?;
        let outcome = state.catalog.write(&path, data, offset.max(0) as u64)?;
        for gone in &outcome.dropped {
            state.inode_store.forget(gone);
        }
        if outcome.path != path {
            tracing::info!("[SongDrive] {} rewritten as new song {}", path, outcome.path);
            state.redirects.insert(fh, outcome.path.clone());
        }
        Ok(outcome.written)
    }

    fn do_release(&self, fh: u64) -> Result<()> {
        self.write_state()?.redirects.remove(&fh);
        Ok(())
    }

    fn do_readlink(&self, ino: u64) -> Result<Vec<u8>> {
        let state = self.read_state()?;
        let path = Self::path_of(&state, ino)?;
        Ok(state.catalog.readlink(&path)?.to_vec())
    }

    fn do_rename(&self, parent: u64, name: &OsStr, newparent: u64, newname: &OsStr) -> Result<()> {
        let mut state = self.write_state()?;
        let old = Self::child_path(&state, parent, name)?;
        let new = Self::child_path(&state, newparent, newname)?;

        let moved = state.catalog.rename(&old, &new)?;
        for (from, to) in &moved {
            state.inode_store.rename(from, to);
        }
        for target in state.redirects.values_mut() {
            if *target == old {
                *target = new.clone();
            }
        }
        Ok(())
    }

    fn do_unlink(&self, parent: u64, name: &OsStr) -> Result<()> {
        let mut state = self.write_state()?;
        let path = Self::child_path(&state, parent, name)?;

        let removed = state.catalog.unlink(&path)?;
        for gone in &removed {
            state.inode_store.forget(gone);
        }
        if !state.catalog.has_category_roots() {
            for root in CATEGORY_ROOTS {
                state.inode_store.forget_subtree(&join_path("/", root));
            }
        }
        Ok(())
    }

    fn do_readdir(&self, ino: u64) -> Result<Vec<(u64, FileType, String)>> {
        let state = self.read_state()?;
        let path = Self::path_of(&state, ino)?;
        let parent_ino = match split_path(&path) {
            Ok((parent, _)) => state.inode_store.get_or_create_inode(parent),
            Err(_) => INODE_ROOT,
        };

        let entries = state.catalog.readdir(&path)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let child_ino = match entry.name.as_str() {
                    "." => ino,
                    ".." => parent_ino,
                    name => state.inode_store.get_or_create_inode(&join_path(&path, name)),
                };
                (child_ino, file_type(entry.kind), entry.name)
            })
            .collect())
    }

    fn do_getxattr(&self, ino: u64, name: &OsStr) -> Result<Vec<u8>> {
        let state = self.read_state()?;
        let path = Self::path_of(&state, ino)?;
        state.catalog.getxattr(&path, utf8(name)?)
    }

    fn do_setxattr(&self, ino: u64, name: &OsStr, value: &[u8]) -> Result<()> {
        let mut state = self.write_state()?;
        let path = Self::path_of(&state, ino)?;
        state.catalog.setxattr(&path, utf8(name)?, value)
    }

    fn do_listxattr(&self, ino: u64) -> Result<Vec<u8>> {
        let state = self.read_state()?;
        let path = Self::path_of(&state, ino)?;
        let mut names = Vec::new();
        for name in state.catalog.listxattr(&path)? {
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
        Ok(names)
    }

    fn do_removexattr(&self, ino: u64, name: &OsStr) -> Result<()> {
        let mut state = self.write_state()?;
        let path = Self::path_of(&state, ino)?;
        state.catalog.removexattr(&path, utf8(name)?)
    }
}

fn utf8(name: &OsStr) -> Result<&str> {
    name.to_str()
        .ok_or_else(|| CatalogError::InvalidPath(name.to_string_lossy().into_owned()))
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::File => FileType::RegularFile,
    }
}

fn file_attr(ino: u64, attrs: &Attributes) -> FileAttr {
    FileAttr {
        ino,
        size: attrs.size,
        blocks: attrs.blocks,
        atime: attrs.atime,
        mtime: attrs.mtime,
        ctime: attrs.ctime,
        crtime: attrs.crtime,
        kind: file_type(attrs.kind()),
        perm: attrs.perm(),
        nlink: attrs.nlink,
        uid: attrs.uid,
        gid: attrs.gid,
        rdev: 0,
        blksize: BLOCK_SIZE as u32,
        flags: 0,
    }
}

/// Size-probe protocol shared by getxattr and listxattr.
fn reply_xattr(reply: ReplyXattr, size: u32, bytes: &[u8]) {
    if size == 0 {
        reply.size(bytes.len() as u32);
    } else if bytes.len() > size as usize {
        reply.error(libc::ERANGE);
    } else {
        reply.data(bytes);
    }
}

impl Filesystem for SongDrive {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> std::result::Result<(), libc::c_int> {
        tracing::info!("[SongDrive] FUSE initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        match self.write_state() {
            Ok(mut state) => state.catalog.destroy(),
            Err(e) => tracing::error!("[SongDrive] destroy: {}", e),
        }
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.do_lookup(parent, name) {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        match self.do_getattr(ino) {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        match self.do_setattr(ino, size) {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => {
                tracing::debug!("[SongDrive] setattr on inode {}: {}", ino, e);
                reply.error(e.errno())
            }
        }
    }

    fn readlink(&mut self, _req: &Request, ino: u64, reply: ReplyData) {
        match self.do_readlink(ino) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(&mut self, _req: &Request, _parent: u64, _name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
        reply.error(libc::EROFS);
    }

    fn rmdir(&mut self, _req: &Request, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(libc::EROFS);
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.do_unlink(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => {
                tracing::debug!("[SongDrive] unlink {:?}: {}", name, e);
                reply.error(e.errno())
            }
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        match self.do_rename(parent, name, newparent, newname) {
            Ok(()) => reply.ok(),
            Err(e) => {
                tracing::debug!("[SongDrive] rename {:?} -> {:?}: {}", name, newname, e);
                reply.error(e.errno())
            }
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.do_open(ino) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.do_read(ino, fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.do_write(ino, fh, offset, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => {
                tracing::debug!("[SongDrive] write to inode {}: {}", ino, e);
                reply.error(e.errno())
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.do_release(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let items = match self.do_readdir(ino) {
            Ok(items) => items,
            Err(e) => { reply.error(e.errno()); return; }
        };
        for (i, (ino, kind, name)) in items.iter().enumerate().skip(offset.max(0) as usize) {
            if reply.add(*ino, (i + 1) as i64, *kind, name) { break; }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        let statfs = match self.read_state() {
            Ok(state) => state.catalog.statfs(),
            Err(e) => { reply.error(e.errno()); return; }
        };
        reply.statfs(
            statfs.blocks,
            statfs.available,
            statfs.available,
            0,
            0,
            statfs.block_size,
            NAME_MAX,
            statfs.block_size,
        );
    }

    fn setxattr(
        &mut self,
        _req: &Request,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        match self.do_setxattr(ino, name, value) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getxattr(&mut self, _req: &Request, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        match self.do_getxattr(ino, name) {
            Ok(value) => reply_xattr(reply, size, &value),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn listxattr(&mut self, _req: &Request, ino: u64, size: u32, reply: ReplyXattr) {
        match self.do_listxattr(ino) {
            Ok(names) => reply_xattr(reply, size, &names),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn removexattr(&mut self, _req: &Request, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.do_removexattr(ino, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        match self.do_create(parent, name) {
            Ok((attr, fh)) => reply.created(&self.ttl, &attr, 0, fh, 0),
            Err(e) => {
                tracing::debug!("[SongDrive] create {:?}: {}", name, e);
                reply.error(e.errno())
            }
        }
    }
}

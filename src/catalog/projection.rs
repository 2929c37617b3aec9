// FILE: src/catalog/projection.rs
//! Mirrors songs into the category views.

use super::{Catalog, ALL_PATH, CATEGORY_ROOTS};
use crate::core::node::{join_path, File, SongId, CATEGORY_MODE};
use crate::core::tags::SongTags;
use crate::error::Result;

impl Catalog {
    /// Places `name` under `/<root>/<letter>/<value>/` for each category and
    /// records the resulting directories (plus `/ALL`) as the song's paths.
    ///
    /// Entries left over from an earlier projection of the same song are
    /// removed and their paths returned. Directories they leave empty stay
    /// until full teardown.
    pub(super) fn project(&mut self, name: &str, song: SongId, tags: &SongTags) -> Result<Vec<String>> {
        self.ensure_category_roots();

        let identity = self.identity;
        let mut paths = Vec::with_capacity(CATEGORY_ROOTS.len() + 1);

        for (root, value) in CATEGORY_ROOTS.into_iter().zip(tags.values()) {
            let letter: String = value.chars().take(1).collect();
            let target = self
                .root
                .add_dir(root, CATEGORY_MODE, identity)
                .add_dir(&letter, CATEGORY_MODE, identity)
                .add_dir(value, CATEGORY_MODE, identity);

            match target.files.get_mut(name) {
                Some(existing) => existing.song = song,
                None => {
                    target.insert_file(name, File::new(song, identity));
                }
            }
            paths.push(format!("/{}/{}/{}", root, letter, value));
        }
        paths.push(ALL_PATH.to_string());

        let previous = std::mem::replace(&mut self.song_mut(song)?.paths, paths.clone());
        let dropped = self.drop_entries(name, song, previous.iter().filter(|p| !paths.contains(p)));

        tracing::debug!("[Catalog] Projected {} into {:?}", name, paths);
        Ok(dropped)
    }

    /// Removes every category entry of the song; it stays under `/ALL` only.
    /// Returns the paths of the removed entries.
    pub(super) fn unproject(&mut self, name: &str, song: SongId) -> Result<Vec<String>> {
        let previous = std::mem::replace(&mut self.song_mut(song)?.paths, vec![ALL_PATH.to_string()]);
        Ok(self.drop_entries(name, song, previous.iter()))
    }

    fn drop_entries<'a>(
        &mut self,
        name: &str,
        song: SongId,
        dirs: impl Iterator<Item = &'a String>,
    ) -> Vec<String> {
        let mut dropped = Vec::new();
        for dir_path in dirs.filter(|p| p.as_str() != ALL_PATH) {
            if let Some(dir) = self.root.dir_mut(dir_path) {
                if dir.files.get(name).map(|f| f.song) == Some(song) {
                    dir.remove_file(name);
                    dropped.push(join_path(dir_path, name));
                }
            }
        }
        dropped
    }
}

// FILE: src/catalog/lifecycle.rs
//! Creation and teardown of the category roots.

use super::{Catalog, CATEGORY_ROOTS};
use crate::core::node::CATEGORY_MODE;

impl Catalog {
    pub fn has_category_roots(&self) -> bool {
        !self.is_empty
    }

    /// Creates the three category roots if the catalog is empty.
    pub(super) fn ensure_category_roots(&mut self) {
        if !self.is_empty {
            return;
        }
        for name in CATEGORY_ROOTS {
            self.root.add_dir(name, CATEGORY_MODE, self.identity);
        }
        self.is_empty = false;
        tracing::info!("[Catalog] First song categorized, category roots created");
    }

    /// Drops the category roots and everything below them once `/ALL` is
    /// empty. Returns whether a teardown happened.
    pub(super) fn teardown_if_empty(&mut self) -> bool {
        let inbox_empty = self.inbox().map(|dir| dir.files.is_empty()).unwrap_or(true);
        if !inbox_empty || self.is_empty {
            return false;
        }
        for name in CATEGORY_ROOTS {
            self.root.remove_dir(name);
        }
        self.is_empty = true;
        tracing::info!("[Catalog] Catalog empty, category roots removed");
        true
    }
}

// FILE: src/core/mod.rs
pub mod inode_store;
pub mod node;
pub mod permissions;
pub mod tags;

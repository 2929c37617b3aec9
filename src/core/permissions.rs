// FILE: src/core/permissions.rs
//! Identity Management
//!
//! Every node reports the uid/gid of the user the filesystem serves. When the
//! binary runs under sudo the invoking user is served, not root.

use crate::config::Config;

/// Captures user identity for ownership reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
    pub is_root: bool,
}

impl Identity {
    /// Capture current or sudo identity
    pub fn capture() -> Self {
        let (uid, gid, is_root) = if let (Some(sudo_uid), Some(sudo_gid)) =
            (std::env::var("SUDO_UID").ok(), std::env::var("SUDO_GID").ok()) {

            let uid = sudo_uid.parse::<u32>().unwrap_or_else(|_| Self::get_current_uid());
            let gid = sudo_gid.parse::<u32>().unwrap_or_else(|_| Self::get_current_gid());
            let is_root = Self::get_current_uid() == 0;

            tracing::info!("[Identity] Running under sudo, serving as UID:{} GID:{}", uid, gid);
            (uid, gid, is_root)

        } else {
            let uid = Self::get_current_uid();
            let gid = Self::get_current_gid();
            let is_root = uid == 0;

            if is_root {
                tracing::warn!("[Identity] Running as root without sudo environment variables");
            } else {
                tracing::info!("[Identity] Running as user UID:{} GID:{}", uid, gid);
            }

            (uid, gid, is_root)
        };

        Self { uid, gid, is_root }
    }

    /// A fixed non-root identity.
    pub fn fixed(uid: u32, gid: u32) -> Self {
        Self { uid, gid, is_root: false }
    }

    fn get_current_uid() -> u32 { unsafe { libc::getuid() } }
    fn get_current_gid() -> u32 { unsafe { libc::getgid() } }

    /// Get mount options based on identity and configuration
    pub fn get_mount_options(&self, config: &Config) -> Vec<fuser::MountOption> {
        let mut options = vec![
            fuser::MountOption::FSName("songfs".to_string()),
            fuser::MountOption::Subtype("songfs".to_string()),
        ];
        // allow_other needs user_allow_other in /etc/fuse.conf for plain users
        if self.is_root || config.allow_other {
            options.push(fuser::MountOption::AllowOther);
        }
        if config.auto_unmount {
            options.push(fuser::MountOption::AutoUnmount);
        }
        options
    }
}

// src/main.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use songfs::core::permissions::Identity;
use songfs::{Config, GlobalState, SongDrive};

#[derive(Parser, Debug)]
#[command(name = "songfs", version, about = "Mount a self-filing song catalog")]
struct Args {
    /// Directory to mount the catalog on
    mountpoint: PathBuf,

    /// Config file (defaults to $XDG_CONFIG_HOME/songfs/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Let other users access the mount
    #[arg(long)]
    allow_other: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    tracing::info!("=");
    tracing::info!("SongFS Starting Up...");
    tracing::info!("=");

    if !args.mountpoint.is_dir() {
        anyhow::bail!("Mountpoint {} is not a directory", args.mountpoint.display());
    }

    let mut config = Config::load(args.config.as_deref()).context("loading config")?;
    if args.allow_other {
        config.allow_other = true;
    }
    tracing::debug!("Config: {:?}", config);

    // ========== INITIALIZE GLOBAL STATE ==========
    let identity = Identity::capture();
    let state = GlobalState::new(identity, &config).shared();
    tracing::info!("✓ Catalog initialized (/ALL ready)");

    // ========== INITIALIZE SONG DRIVE (FUSE Loop) ==========
    let drive = SongDrive::new(state, config.attr_ttl());
    let mount_options = identity.get_mount_options(&config);

    let session = fuser::spawn_mount2(drive, &args.mountpoint, &mount_options)
        .with_context(|| format!("mounting on {}", args.mountpoint.display()))?;
    tracing::info!("FUSE mounted on {} (Ctrl-C to unmount)", args.mountpoint.display());

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;

    tracing::info!("SongFS shutting down...");
    drop(session);
    Ok(())
}

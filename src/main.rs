//! deskstick
//!
//! Pins frameless "instance" windows to the desktop background layer and
//! gives them WinAmp-style sticky snapping against screen edges and each
//! other during interactive move/resize.

mod config;
mod pin;
mod platform;
mod shared;
mod stick;

#[cfg(windows)]
mod app;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "deskstick=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting deskstick");

    let config = config::Config::load()?;

    #[cfg(windows)]
    {
        app::run(config)
    }

    #[cfg(not(windows))]
    {
        let _ = config;
        anyhow::bail!("deskstick drives the Windows desktop shell and only runs on Windows");
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that opens the Gridboard editor.

mod config;
mod logging;
mod palette;
mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gridboard_rendering::{visuals::VisualLoader, Presentation, RenderingBackend, Scene};
use gridboard_rendering_macroquad::MacroquadBackend;
use gridboard_system_persistence::{HttpSink, LogSink, SnapshotSink};
use tracing::info;

use crate::{
    config::{Config, Overrides},
    session::Session,
};

/// Command-line arguments accepted by the editor.
#[derive(Debug, Parser)]
#[command(name = "gridboard", about = "Grid-aligned icon placement editor", version)]
struct CliArgs {
    /// TOML configuration file; `gridboard.toml` is read when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory scanned for palette icons.
    #[arg(long, value_name = "DIR")]
    icons: Option<PathBuf>,

    /// Endpoint receiving a snapshot after every persisted mutation.
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Log snapshots instead of posting them.
    #[arg(long)]
    offline: bool,

    /// Log filter directive, replacing `RUST_LOG`.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Render as fast as possible instead of waiting for vertical sync.
    #[arg(long)]
    no_vsync: bool,
}

/// Entry point for the Gridboard command-line interface.
fn main() -> Result<()> {
    let args = CliArgs::parse();
    logging::init_tracing(args.log_level.as_deref())?;

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    config.apply(Overrides {
        icons: args.icons,
        endpoint: args.endpoint,
        offline: args.offline,
    });
    config.validate().context("invalid configuration")?;

    let lattice = config.lattice()?;
    let sources = palette::discover(&config.palette.directory)?;

    let sink: Box<dyn SnapshotSink> = if config.persistence.enabled {
        info!(endpoint = %config.persistence.endpoint, "posting snapshots");
        Box::new(HttpSink::new(config.persistence.endpoint.clone()))
    } else {
        info!("offline: snapshots are only logged");
        Box::new(LogSink)
    };

    let mut session = Session::new(
        lattice,
        config.double_click_window(),
        VisualLoader::default(),
        sink,
    );
    let mut scene = Scene::default();
    session.open_palette(sources, &mut scene);

    let presentation = Presentation::new(config.window.title.clone(), scene)
        .with_window_size(config.window.width, config.window.height)
        .with_margins(config.margins());

    MacroquadBackend::new()
        .with_vsync(!args.no_vsync)
        .run(presentation, move |_dt, input, scene| {
            session.update(input, scene);
        })
}

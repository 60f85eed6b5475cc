use std::path::PathBuf;

use clap::Parser;
use lumen_core::{ConfigManager, ShowCommand, ShowCoordinator, ShowEvent};
use lumen_fixtures::FixtureLibrary;

/// Realtime show-control engine: DMX layering, chaser playback, audio-driven
/// timing, MIDI sequencing and input mapping.
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(about = "Lumen show-control engine")]
struct Args {
    /// Path to the fixture profile library (JSON)
    #[arg(long)]
    fixtures: PathBuf,

    /// Project file to load on startup
    #[arg(long)]
    project: Option<PathBuf>,

    /// Song file to load on startup
    #[arg(long)]
    song: Option<PathBuf>,

    /// Config file path (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory for song media (audio/MIDI/lyrics files copied in)
    #[arg(long, default_value = "./data")]
    data_root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = Args::parse();

    let mut config_manager = ConfigManager::new(args.config);
    let settings = config_manager.load()?;

    let library = FixtureLibrary::load_from_file(&args.fixtures)
        .map_err(|e| anyhow::anyhow!("failed to load fixture library {}: {}", args.fixtures.display(), e))?;

    let (cmd_tx, mut event_rx) = ShowCoordinator::spawn(
        library,
        args.data_root,
        settings.dmx_port.clone(),
        settings.audio_device.clone(),
        settings.midi_control_port.clone(),
    );

    if let Some(project) = args.project {
        cmd_tx.send(ShowCommand::LoadProject { path: project }).await?;
    }
    if let Some(song) = args.song {
        cmd_tx.send(ShowCommand::LoadSong { path: song }).await?;
    }

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ShowEvent::Error { message } => log::error!("{}", message),
                other => log::debug!("{:?}", other),
            }
        }
    });

    log::info!("lumen running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    cmd_tx.send(ShowCommand::Shutdown).await?;
    Ok(())
}

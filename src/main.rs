//! kartpad - ghost replay inspector
//!
//! Replays an uncompressed ghost input section frame by frame and prints the
//! input state the race engine would see.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kp_core::Config;
use kp_input::{InputSection, RaceInputState, ReplaySession};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Uncompressed ghost input-data section
    input: PathBuf,

    /// Stop after this many replayed frames
    #[arg(long)]
    frames: Option<u32>,

    /// Print one JSON object per frame
    #[arg(long)]
    json: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay with automatic transmission
    #[arg(long)]
    auto_drift: bool,

    /// Open the replay gate on the first frame instead of after the intro
    #[arg(long)]
    start_immediately: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, config_error) = match &args.config {
        Some(path) => (Config::load_from(path)?, None),
        None => match Config::load() {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
    };
    kp_core::logging::init(&config.debug);
    if let Some(e) = config_error {
        tracing::warn!("Using default configuration: {}", e);
    }

    if args.auto_drift {
        config.playback.drift_is_auto = true;
    }

    let path = if args.input.is_absolute() {
        args.input.clone()
    } else {
        config.paths.resolve(&args.input)
    };
    tracing::info!("Replaying {}", path.display());

    let bytes = std::fs::read(&path)
        .with_context(|| format!("reading ghost inputs from {}", path.display()))?;
    let section = InputSection::from_bytes(&bytes)
        .with_context(|| format!("parsing ghost inputs from {}", path.display()))?;

    let mut session = ReplaySession::from_config(section, &config.playback)?
        .with_frame_tracing(config.debug.trace_frames);
    if args.start_immediately {
        session.skip_intro();
    }

    let limit = args.frames.unwrap_or(u32::MAX);
    while !session.is_finished() && session.input_frame() < limit {
        let polled = session.input_frame();
        let state = *session.tick()?;
        if session.input_frame() == polled {
            continue;
        }

        if args.json {
            let record = serde_json::json!({
                "frame": polled,
                "stage": format!("{:?}", session.stage()),
                "control_source": session.player().pad().controller().map(|c| c.control_source()),
                "state": state,
            });
            println!("{}", record);
        } else {
            println!("{:6} {}", polled, describe(&state));
        }
    }

    tracing::info!(
        "Replayed {} frames ({} ticks)",
        session.input_frame(),
        session.frame()
    );
    Ok(())
}

fn describe(state: &RaceInputState) -> String {
    let flag = |on: bool, c: char| if on { c } else { '.' };
    let stick = state.stick();
    format!(
        "{}{}{}{} stick({:+.3}, {:+.3}) trick {:?}{}",
        flag(state.accelerate(), 'A'),
        flag(state.brake(), 'B'),
        flag(state.item(), 'I'),
        flag(state.drift(), 'D'),
        stick.x,
        stick.y,
        state.trick(),
        if state.is_valid() { "" } else { " INVALID" }
    )
}

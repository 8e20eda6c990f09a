//! Impact Sim entry point
//!
//! Headless driver: spawns one projectile, runs the frame loop at 60 Hz
//! until every effect has settled, and prints the final state as JSON.
//!
//! Usage: `impact-sim [diameter_km] [velocity_km_s] [stony|iron|carbonaceous]`
//! Settings are read from `$IMPACT_SIM_SETTINGS` or `impact-sim.json`.

use std::path::PathBuf;

use impact_sim::consts::FRAME_DT;
use impact_sim::renderer::FrameBuilder;
use impact_sim::sim::{DensityClass, SequencerPhase, SimEvent, SimulationState, SpawnCommand, TickInput, tick};
use impact_sim::{ConfigError, Settings};

/// Give up if nothing settles within this much simulated time
const MAX_SIM_SECONDS: f64 = 180.0;

fn parse_command(args: &[String]) -> SpawnCommand {
    let number = |i: usize, default: f32| -> f32 {
        match args.get(i) {
            Some(s) => s.parse().unwrap_or_else(|_| {
                log::warn!("Ignoring non-numeric argument {s:?}");
                default
            }),
            None => default,
        }
    };
    let asteroid_type = args
        .get(3)
        .and_then(|s| DensityClass::parse(s))
        .unwrap_or_default();
    SpawnCommand::new(number(1, 1.0), number(2, 20.0), asteroid_type)
}

fn main() -> Result<(), ConfigError> {
    env_logger::init();
    log::info!("Impact Sim starting...");

    let settings_path = std::env::var_os("IMPACT_SIM_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("impact-sim.json"));
    let settings = Settings::load_or_default(&settings_path);
    let quality = settings.quality;

    let args: Vec<String> = std::env::args().collect();
    let command = parse_command(&args);

    let mut state = SimulationState::new(settings);
    let mut frames = FrameBuilder::new(quality);
    state.spawn(command);

    let input = TickInput::default();
    let mut done = false;
    while !done && state.time < MAX_SIM_SECONDS {
        tick(&mut state, &input, FRAME_DT);
        let frame = frames.build(&state);

        for event in state.drain_events() {
            match &event {
                SimEvent::Impact { event: impact, .. } => log::info!(
                    "Impact at {:?}, {} vertices this frame",
                    impact.local_point,
                    frame.vertex_count()
                ),
                SimEvent::CycleComplete { .. } => done = true,
                _ => log::debug!("{event:?}"),
            }
        }
        for notice in state.drain_notices() {
            log::warn!("{notice:?}");
        }
    }

    let snapshot = state.query_state();
    if snapshot.phase != SequencerPhase::Idle {
        log::warn!("Stopped after {:.0}s in phase {}", snapshot.time, snapshot.phase.as_str());
    }
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(e) => return Err(ConfigError::Serialize(e)),
    }
    Ok(())
}

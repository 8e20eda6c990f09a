//! End-to-end runs through the public command/query interface

use std::time::{Duration, Instant};

use glam::Vec3;
use impact_sim::consts::*;
use impact_sim::estimate::{ImpactEstimator, ImpactRequest, ImpactResponse};
use impact_sim::sim::{
    DensityClass, EffectKind, Notice, SequencerPhase, SimEvent, SimulationState, SpawnCommand, SurfaceClass,
    SurfaceClassifier, SurfaceTexture, TickInput, tick,
};
use impact_sim::{EstimateError, QualityPreset, Settings};

const LAND: [u8; 4] = [60, 140, 50, 255];
const WATER: [u8; 4] = [20, 60, 190, 255];

fn uniform(texel: [u8; 4]) -> SurfaceClassifier {
    SurfaceClassifier::from_texture(SurfaceTexture::from_pixels(8, 4, vec![texel; 32]).unwrap())
}

fn new_state(classifier: SurfaceClassifier) -> SimulationState {
    SimulationState::new(Settings::from_preset(QualityPreset::Low)).with_classifier(classifier)
}

fn step(state: &mut SimulationState, events: &mut Vec<SimEvent>) {
    tick(state, &TickInput::default(), FRAME_DT);
    events.extend(state.drain_events());
}

/// Tick until the next impact; returns the simulation time it happened at
fn run_to_impact(state: &mut SimulationState, events: &mut Vec<SimEvent>) -> f64 {
    let before = state.impacts;
    for _ in 0..20_000 {
        step(state, events);
        if state.impacts > before {
            return state.time;
        }
    }
    panic!("no impact");
}

fn run_until_idle(state: &mut SimulationState, events: &mut Vec<SimEvent>) {
    for _ in 0..20_000 {
        step(state, events);
        if state.sequencer.phase() == SequencerPhase::Idle {
            return;
        }
    }
    panic!("never settled");
}

fn completed(events: &[SimEvent], kind: EffectKind) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SimEvent::EffectComplete { kind: k, .. } if *k == kind))
        .count()
}

#[test]
fn test_land_impact_carves_without_tsunami() {
    let mut state = new_state(uniform(LAND));
    let mut events = Vec::new();
    state.spawn(SpawnCommand::new(1.0, 5.0, DensityClass::Stony));

    run_to_impact(&mut state, &mut events);
    let impact = state.last_impact.expect("impact recorded");
    assert!(!state.primary.mesh.is_indexed());
    let deepest = state
        .primary
        .mesh
        .positions
        .iter()
        .map(|p| p.length())
        .fold(f32::MAX, f32::min);
    assert!(deepest < PRIMARY_RADIUS - 1e-3);
    assert!(deepest >= PRIMARY_RADIUS - impact.crater_depth - 1e-3);

    run_until_idle(&mut state, &mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::Classified {
            class: SurfaceClass::Land,
            ..
        }
    )));
    assert!(!events.iter().any(|e| matches!(e, SimEvent::TsunamiSpawned { .. })));
    assert_eq!(completed(&events, EffectKind::TsunamiHump), 0);
    assert_eq!(completed(&events, EffectKind::BlastRings), 1);
    assert_eq!(completed(&events, EffectKind::Glow), 1);
    assert_eq!(state.ledger.live_count(), 0);
}

#[test]
fn test_water_impact_spawns_max_waves_gone_by_seven_seconds() {
    let mut state = new_state(uniform(WATER));
    let mut events = Vec::new();
    state.spawn(SpawnCommand::new(2.0, 10.0, DensityClass::Iron));

    let impact_time = run_to_impact(&mut state, &mut events);
    assert_eq!(state.effects.count_kind(EffectKind::TsunamiHump), MAX_WAVES as usize);
    assert!(events.contains(&SimEvent::TsunamiSpawned {
        cycle: 1,
        waves: MAX_WAVES
    }));

    while state.time < impact_time + 7.0 {
        step(&mut state, &mut events);
    }
    assert_eq!(state.effects.count_kind(EffectKind::TsunamiHump), 0);
    assert_eq!(completed(&events, EffectKind::TsunamiHump), MAX_WAVES as usize);
    assert!(state.last_estimate.as_ref().is_some_and(|e| e.tsunami_risk));
}

#[test]
fn test_respawn_mid_flight_replaces_projectile() {
    let mut state = new_state(uniform(LAND));
    let mut events = Vec::new();
    state.spawn(SpawnCommand::new(3.0, 4.0, DensityClass::Stony));
    for _ in 0..20 {
        step(&mut state, &mut events);
    }
    let old_path = state.orbit_path.as_ref().map(|p| p.resource).expect("path");
    let old_visual = state.projectile().and_then(|p| p.visual).expect("visual");

    tick(
        &mut state,
        &TickInput::spawn(SpawnCommand::new(6.0, 8.0, DensityClass::Carbonaceous)),
        FRAME_DT,
    );
    events.extend(state.drain_events());

    assert_eq!(state.projectile_count(), 1);
    assert!(!state.ledger.is_live(old_path));
    assert!(!state.ledger.is_live(old_visual));
    assert_eq!(state.ledger.live_count(), 2);
    assert!(events.contains(&SimEvent::ProjectileCancelled { cycle: 1 }));
    assert_eq!(state.projectile().map(|p| p.density), Some(DensityClass::Carbonaceous));

    run_to_impact(&mut state, &mut events);
    assert_eq!(state.impacts, 1, "only the replacement ever lands");
}

#[test]
fn test_respawn_while_draining_lets_effects_finish() {
    let mut state = new_state(uniform(WATER));
    let mut events = Vec::new();
    state.spawn(SpawnCommand::new(2.0, 12.0, DensityClass::Stony).aimed_at(Vec3::Z));
    run_to_impact(&mut state, &mut events);
    step(&mut state, &mut events);
    let first_cycle_effects = state.effects.live_count();
    assert!(first_cycle_effects > 0);
    assert_eq!(state.sequencer.phase(), SequencerPhase::Draining);

    state.spawn(SpawnCommand::new(2.0, 12.0, DensityClass::Stony).aimed_at(Vec3::NEG_Z));
    step(&mut state, &mut events);
    assert_eq!(state.sequencer.phase(), SequencerPhase::Armed);
    assert_eq!(state.effects.live_count(), first_cycle_effects, "old effects keep running");

    run_to_impact(&mut state, &mut events);
    run_until_idle(&mut state, &mut events);
    // Whatever is left of the first cycle still expires on its own
    while state.effects.live_count() > 0 {
        step(&mut state, &mut events);
    }
    assert_eq!(state.ledger.live_count(), 0);
    assert_eq!(state.impacts, 2);
    assert!(events.contains(&SimEvent::CycleComplete { cycle: 2 }));
    assert!(!events.contains(&SimEvent::CycleComplete { cycle: 1 }));
}

#[test]
fn test_deferred_texture_classifies_when_ready() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("earth.png");
    image::RgbaImage::from_pixel(16, 8, image::Rgba(WATER)).save(&path).unwrap();

    let mut settings = Settings::from_preset(QualityPreset::Low);
    settings.texture_path = Some(path.clone());
    let mut state = SimulationState::new(settings);
    let mut events = Vec::new();
    state.spawn(SpawnCommand::new(1.0, 10.0, DensityClass::Stony));

    run_to_impact(&mut state, &mut events);
    let deadline = Instant::now() + Duration::from_secs(10);
    while !events.iter().any(|e| matches!(e, SimEvent::Classified { .. })) && Instant::now() < deadline {
        step(&mut state, &mut events);
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(events.contains(&SimEvent::Classified {
        cycle: 1,
        class: SurfaceClass::Water,
        strength: 1.0
    }));
}

#[test]
fn test_missing_texture_falls_back_to_land() {
    let mut settings = Settings::from_preset(QualityPreset::Low);
    settings.texture_path = Some("/nonexistent/earth.jpg".into());
    let mut state = SimulationState::new(settings);
    let mut events = Vec::new();
    state.spawn(SpawnCommand::new(1.0, 10.0, DensityClass::Stony));

    run_to_impact(&mut state, &mut events);
    run_until_idle(&mut state, &mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::Classified {
            class: SurfaceClass::Land,
            ..
        }
    )));
    assert_eq!(completed(&events, EffectKind::TsunamiHump), 0);
}

struct Offline;

impl ImpactEstimator for Offline {
    fn estimate(&self, _request: &ImpactRequest) -> Result<ImpactResponse, EstimateError> {
        Err(EstimateError::Upstream {
            status: 503,
            message: Some("down for maintenance".to_string()),
        })
    }
}

#[test]
fn test_estimate_failure_is_a_notice() {
    let mut state = new_state(uniform(LAND)).with_estimator(Offline);
    let mut events = Vec::new();
    state.spawn(SpawnCommand::new(1.0, 10.0, DensityClass::Stony));
    run_to_impact(&mut state, &mut events);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut notices = Vec::new();
    while notices.is_empty() && Instant::now() < deadline {
        step(&mut state, &mut events);
        notices.extend(state.drain_notices());
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(matches!(notices.as_slice(), [Notice::EstimateUnavailable(msg)] if msg.contains("503")));

    // The local estimate still stands and the cycle still completes
    assert!(state.last_estimate.is_some());
    run_until_idle(&mut state, &mut events);
    assert_eq!(state.query_state().live_resources, 0);
}

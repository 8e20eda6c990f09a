//! Frame tick
//!
//! One call per rendered frame. Order within a tick is fixed:
//! spawn, propagate (and impact), deferred classification, effects,
//! remote estimates, settle.

use super::classifier::Classification;
use super::effects::EffectHandle;
use super::orbit::OrbitPropagator;
use super::sequencer::ImpactTargets;
use super::state::{ImpactEvent, Notice, OrbitPath, Projectile, SimEvent, SimulationState, SpawnCommand};
use crate::consts::*;
use crate::estimate::{EstimateSource, ImpactEstimate, ImpactRequest};

/// Trajectory samples kept for the orbit-path visual
pub const PATH_SAMPLES: usize = 900;

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Replace the current projectile (takes priority over [`SimulationState::spawn`])
    pub spawn: Option<SpawnCommand>,
}

impl TickInput {
    pub fn spawn(command: SpawnCommand) -> Self {
        Self { spawn: Some(command) }
    }
}

/// Advance the simulation by `dt` seconds (clamped to `[0, MAX_FRAME_DT]`)
pub fn tick(state: &mut SimulationState, input: &TickInput, dt: f32) {
    let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_DT) } else { 0.0 };
    state.time += f64::from(dt);
    state.primary.rotate(dt);

    // Both are consumed; the explicit input wins
    if let Some(command) = input.spawn.or(state.queued_spawn.take()) {
        spawn_projectile(state, command);
    }

    let impact = match state.propagator.as_mut() {
        Some(propagator) => {
            propagator.projectile_mut().spin += PROJECTILE_SPIN_SPEED * dt;
            propagator.step(dt, &state.primary)
        }
        None => None,
    };
    if let Some(event) = impact {
        handle_impact(state, event);
    }

    if let Some((ticket, classification)) = state.classifier.poll() {
        let spawned = state.sequencer.on_classified(
            ticket,
            &classification,
            &mut state.effects,
            &mut state.ledger,
            &state.tsunami,
            state.time,
        );
        if let Some(handles) = spawned {
            record_classification(state, ticket, &classification, &handles);
        }
    }

    let disposed = state.effects.advance(state.time, &mut state.ledger);
    state.sequencer.on_disposed(&disposed);
    state
        .events
        .extend(disposed.iter().map(|d| SimEvent::EffectComplete { id: d.id, kind: d.kind }));

    poll_estimates(state);

    if let Some(cycle) = state.sequencer.settle() {
        state.events.push(SimEvent::CycleComplete { cycle });
    }
}

fn spawn_projectile(state: &mut SimulationState, requested: SpawnCommand) {
    let command = requested.sanitized();
    if command.diameter_km != requested.diameter_km || command.velocity_km_s != requested.velocity_km_s {
        log::warn!(
            "Spawn parameters clamped: {} km @ {} km/s -> {} km @ {} km/s",
            requested.diameter_km,
            requested.velocity_km_s,
            command.diameter_km,
            command.velocity_km_s
        );
        state.notices.push(Notice::ParametersClamped {
            requested,
            used: command,
        });
    }

    if discard_projectile(state).is_some() {
        state.events.push(SimEvent::ProjectileCancelled {
            cycle: state.sequencer.cycle(),
        });
    }
    let cycle = state.sequencer.arm(&mut state.classifier);

    let mut propagator = OrbitPropagator::launch(&command, &state.settings, state.primary.radius, &mut state.rng);
    propagator.projectile_mut().visual = Some(state.ledger.allocate());
    let points = propagator.predict_path(FRAME_DT, PATH_SAMPLES, &state.primary);
    state.orbit_path = Some(OrbitPath {
        points,
        resource: state.ledger.allocate(),
    });
    state.propagator = Some(propagator);

    log::info!(
        "Cycle {}: {} asteroid, {:.2} km @ {:.1} km/s",
        cycle,
        command.asteroid_type.as_str(),
        command.diameter_km,
        command.velocity_km_s
    );
    state.events.push(SimEvent::Spawned { cycle });
}

/// Drop the projectile and its path visual, releasing both resources
fn discard_projectile(state: &mut SimulationState) -> Option<Projectile> {
    if let Some(path) = state.orbit_path.take() {
        state.ledger.release(path.resource);
    }
    let projectile = state.propagator.take()?.into_projectile();
    if let Some(handle) = projectile.visual {
        state.ledger.release(handle);
    }
    Some(projectile)
}

fn handle_impact(state: &mut SimulationState, event: ImpactEvent) {
    let cycle = state.sequencer.cycle();
    state.impacts += 1;
    state.last_impact = Some(event);
    state.events.push(SimEvent::Impact { cycle, event });

    let targets = ImpactTargets {
        mesh: &mut state.primary.mesh,
        deformer: &state.deformer,
        effects: &mut state.effects,
        ledger: &mut state.ledger,
        classifier: &mut state.classifier,
        tsunami: &state.tsunami,
        now: state.time,
    };
    let outcome = state.sequencer.handle_impact(&event, targets);
    let classification = outcome.as_ref().and_then(|o| o.classification);

    let request = ImpactRequest::from_impact(&event);
    state.last_estimate = Some(ImpactEstimate::local(
        &request,
        classification.is_some_and(|c| c.touches_water()),
    ));
    if let Some(service) = &state.estimates
        && let Err(e) = service.submit(cycle, request)
    {
        state.notices.push(Notice::EstimateUnavailable(e.to_string()));
    }

    if let (Some(outcome), Some(classification)) = (&outcome, &classification) {
        record_classification(state, cycle, classification, &outcome.tsunami);
    }

    discard_projectile(state);
}

fn record_classification(
    state: &mut SimulationState,
    cycle: u64,
    classification: &Classification,
    tsunami: &[EffectHandle],
) {
    state.events.push(SimEvent::Classified {
        cycle,
        class: classification.class,
        strength: classification.strength,
    });
    if !tsunami.is_empty() {
        state.events.push(SimEvent::TsunamiSpawned {
            cycle,
            waves: tsunami.len() as u32,
        });
    }
    if let Some(estimate) = state.last_estimate.as_mut()
        && estimate.source == EstimateSource::Local
    {
        estimate.tsunami_risk = classification.touches_water();
    }
}

fn poll_estimates(state: &mut SimulationState) {
    let Some(service) = &state.estimates else {
        return;
    };
    for (cycle, result) in service.drain_results() {
        if cycle != state.sequencer.cycle() {
            log::debug!("Dropping estimate for stale cycle {cycle}");
            continue;
        }
        match result {
            Ok(response) => {
                let estimate = ImpactEstimate::from_response(&response);
                log::info!(
                    "Cycle {}: remote estimate {:.0} m crater, magnitude {:.2}",
                    cycle,
                    estimate.crater_diameter_m,
                    estimate.seismic_magnitude
                );
                state.last_estimate = Some(estimate.clone());
                state.events.push(SimEvent::EstimateReceived { cycle, estimate });
            }
            Err(e) => {
                log::warn!("Remote estimate unavailable: {e}");
                state.notices.push(Notice::EstimateUnavailable(e.to_string()));
            }
        }
    }
}

//! Impact effects sequencing
//!
//! One impact produces a fixed sequence: carve the crater, paint it, fire
//! the blast rings and the glow, then classify the surface and raise a
//! tsunami sized by how much water surrounds the point. Classification
//! may resolve on a later tick, so the sequencer tracks which cycle it
//! belongs to and drops late answers for a cycle that has since been
//! replaced.
//!
//! ```text
//! Idle --arm--> Armed --impact--> Triggered --classified--> Draining --all disposed--> Idle
//!                 ^                                                                     |
//!                 +------------------------------- arm (respawn) ----------------------+
//! ```

use serde::{Deserialize, Serialize};

use super::classifier::{Classification, SurfaceClassifier};
use super::crater::{CarveReport, SurfaceDeformer};
use super::effects::{
    CraterPaintParams, DisposedEffect, EffectHandle, EffectParams, EffectScheduler, GlowParams, RingParams,
};
use super::mesh::SurfaceMesh;
use super::resources::ResourceLedger;
use super::state::ImpactEvent;
use super::tsunami::TsunamiWaveGenerator;

/// Where the current impact cycle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequencerPhase {
    /// Nothing in flight, nothing animating for the current cycle
    #[default]
    Idle,
    /// A projectile is in flight
    Armed,
    /// Impact handled, surface classification outstanding
    Triggered,
    /// Every effect spawned; waiting for them to finish
    Draining,
}

impl SequencerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequencerPhase::Idle => "idle",
            SequencerPhase::Armed => "armed",
            SequencerPhase::Triggered => "triggered",
            SequencerPhase::Draining => "draining",
        }
    }
}

/// Everything an impact writes to, borrowed for the duration of one call
pub struct ImpactTargets<'a> {
    pub mesh: &'a mut SurfaceMesh,
    pub deformer: &'a SurfaceDeformer,
    pub effects: &'a mut EffectScheduler,
    pub ledger: &'a mut ResourceLedger,
    pub classifier: &'a mut SurfaceClassifier,
    pub tsunami: &'a TsunamiWaveGenerator,
    /// Simulation time (seconds)
    pub now: f64,
}

/// What `handle_impact` did
#[derive(Debug, Clone, Default)]
pub struct ImpactOutcome {
    pub carve: CarveReport,
    /// Crater paint, blast rings and glow, in spawn order
    pub effects: Vec<EffectHandle>,
    /// `Some` when classification resolved immediately
    pub classification: Option<Classification>,
    pub tsunami: Vec<EffectHandle>,
}

/// Drives one impact's effects from trigger to settle
#[derive(Debug, Clone, Default)]
pub struct ImpactEffectsSequencer {
    phase: SequencerPhase,
    cycle: u64,
    /// Effects of the current cycle not yet disposed
    outstanding: usize,
    awaiting_classification: bool,
}

impl ImpactEffectsSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SequencerPhase {
        self.phase
    }

    /// Id of the current cycle; also the owner tag of its effects
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_awaiting_classification(&self) -> bool {
        self.awaiting_classification
    }

    /// Start a new cycle for a freshly spawned projectile.
    ///
    /// Any queued classification for the previous cycle is cancelled;
    /// that cycle's effects keep animating but no longer hold this one open.
    pub fn arm(&mut self, classifier: &mut SurfaceClassifier) -> u64 {
        if self.awaiting_classification {
            classifier.cancel();
        }
        if self.phase != SequencerPhase::Idle {
            log::debug!("Cycle {} abandoned in phase {}", self.cycle, self.phase.as_str());
        }
        self.cycle += 1;
        self.phase = SequencerPhase::Armed;
        self.outstanding = 0;
        self.awaiting_classification = false;
        self.cycle
    }

    /// Run the impact sequence. Ignored unless armed.
    pub fn handle_impact(&mut self, impact: &ImpactEvent, targets: ImpactTargets<'_>) -> Option<ImpactOutcome> {
        if self.phase != SequencerPhase::Armed {
            log::warn!("Impact ignored: sequencer is {}", self.phase.as_str());
            return None;
        }

        let ImpactTargets {
            mesh,
            deformer,
            effects,
            ledger,
            classifier,
            tsunami,
            now,
        } = targets;
        let anchor = impact.local_point;
        let mut outcome = ImpactOutcome {
            carve: deformer.carve(mesh, anchor, impact.crater_radius, impact.crater_depth),
            ..ImpactOutcome::default()
        };

        for params in [
            EffectParams::CraterPaint(CraterPaintParams::for_crater(impact.crater_radius)),
            EffectParams::BlastRings(RingParams::for_crater(impact.crater_radius)),
            EffectParams::Glow(GlowParams::for_crater(impact.crater_radius)),
        ] {
            outcome.effects.push(effects.spawn(anchor, params, self.cycle, now, ledger));
        }
        self.outstanding += outcome.effects.len();
        self.phase = SequencerPhase::Triggered;

        match classifier.request(self.cycle, anchor) {
            Some(classification) => {
                outcome.tsunami = self.spawn_tsunami(&classification, effects, ledger, tsunami, now);
                outcome.classification = Some(classification);
            }
            None => {
                log::debug!("Cycle {} waiting on surface texture", self.cycle);
                self.awaiting_classification = true;
            }
        }

        log::info!(
            "Cycle {}: crater moved {} vertices, {} effects live",
            self.cycle,
            outcome.carve.vertices_moved,
            self.outstanding
        );
        Some(outcome)
    }

    /// Deliver a deferred classification. Answers for any other cycle are dropped.
    pub fn on_classified(
        &mut self,
        ticket: u64,
        classification: &Classification,
        effects: &mut EffectScheduler,
        ledger: &mut ResourceLedger,
        tsunami: &TsunamiWaveGenerator,
        now: f64,
    ) -> Option<Vec<EffectHandle>> {
        if ticket != self.cycle || !self.awaiting_classification {
            log::debug!("Dropping stale classification for cycle {ticket}");
            return None;
        }
        self.awaiting_classification = false;
        Some(self.spawn_tsunami(classification, effects, ledger, tsunami, now))
    }

    /// Count down effects of the current cycle
    pub fn on_disposed(&mut self, disposed: &[DisposedEffect]) {
        if !matches!(self.phase, SequencerPhase::Triggered | SequencerPhase::Draining) {
            return;
        }
        let mine = disposed.iter().filter(|d| d.owner == self.cycle).count();
        self.outstanding = self.outstanding.saturating_sub(mine);
    }

    /// Advance phase once classification and effects allow it.
    ///
    /// Returns the cycle id when it returns to idle.
    pub fn settle(&mut self) -> Option<u64> {
        if self.phase == SequencerPhase::Triggered && !self.awaiting_classification {
            self.phase = SequencerPhase::Draining;
        }
        if self.phase == SequencerPhase::Draining && self.outstanding == 0 {
            self.phase = SequencerPhase::Idle;
            log::info!("Cycle {} complete", self.cycle);
            return Some(self.cycle);
        }
        None
    }

    /// Return to idle without an impact (projectile discarded, nothing spawned)
    pub fn disarm(&mut self) {
        if self.phase == SequencerPhase::Armed {
            self.phase = SequencerPhase::Idle;
        }
    }

    fn spawn_tsunami(
        &mut self,
        classification: &Classification,
        effects: &mut EffectScheduler,
        ledger: &mut ResourceLedger,
        tsunami: &TsunamiWaveGenerator,
        now: f64,
    ) -> Vec<EffectHandle> {
        let handles = tsunami.spawn(
            classification.anchor,
            classification.strength,
            self.cycle,
            now,
            effects,
            ledger,
        );
        self.outstanding += handles.len();
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::classifier::{SurfaceClass, SurfaceTexture};
    use crate::sim::effects::EffectKind;
    use crate::sim::state::DensityClass;
    use glam::Vec3;

    struct World {
        mesh: SurfaceMesh,
        deformer: SurfaceDeformer,
        effects: EffectScheduler,
        ledger: ResourceLedger,
        classifier: SurfaceClassifier,
        tsunami: TsunamiWaveGenerator,
    }

    impl World {
        fn new(classifier: SurfaceClassifier) -> Self {
            Self {
                mesh: SurfaceMesh::icosphere(PRIMARY_RADIUS, 2),
                deformer: SurfaceDeformer::default(),
                effects: EffectScheduler::new(),
                ledger: ResourceLedger::new(),
                classifier,
                tsunami: TsunamiWaveGenerator::new(MAX_WAVES, 8, PRIMARY_RADIUS),
            }
        }

        fn targets(&mut self, now: f64) -> ImpactTargets<'_> {
            ImpactTargets {
                mesh: &mut self.mesh,
                deformer: &self.deformer,
                effects: &mut self.effects,
                ledger: &mut self.ledger,
                classifier: &mut self.classifier,
                tsunami: &self.tsunami,
                now,
            }
        }

        /// Tick effects until the sequencer settles; returns the settle time
        fn drain(&mut self, seq: &mut ImpactEffectsSequencer, mut now: f64) -> f64 {
            for _ in 0..2000 {
                now += FRAME_DT as f64;
                let disposed = self.effects.advance(now, &mut self.ledger);
                seq.on_disposed(&disposed);
                if seq.settle().is_some() {
                    return now;
                }
            }
            panic!("sequencer never settled");
        }
    }

    fn solid(rgba: [u8; 4]) -> SurfaceClassifier {
        SurfaceClassifier::from_texture(SurfaceTexture::from_pixels(4, 2, vec![rgba; 8]).unwrap())
    }

    fn impact() -> ImpactEvent {
        ImpactEvent {
            local_point: Vec3::new(0.0, PRIMARY_RADIUS, 0.0),
            world_point: Vec3::new(0.0, PRIMARY_RADIUS, 0.0),
            crater_radius: 2.5,
            crater_depth: 1.375,
            impact_speed: 20.0,
            impact_angle_deg: 90.0,
            projectile_radius: 0.5,
            diameter_km: 3.0,
            velocity_km_s: 12.0,
            density: DensityClass::Stony,
        }
    }

    #[test]
    fn test_land_impact_spawns_three_effects() {
        let mut world = World::new(solid([40, 160, 40, 255]));
        let mut seq = ImpactEffectsSequencer::new();
        seq.arm(&mut world.classifier);

        let outcome = seq.handle_impact(&impact(), world.targets(0.0)).unwrap();
        assert!(outcome.carve.vertices_moved > 0);
        let kinds: Vec<EffectKind> = outcome.effects.iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![EffectKind::CraterPaint, EffectKind::BlastRings, EffectKind::Glow]
        );
        assert!(outcome.tsunami.is_empty());
        assert_eq!(seq.phase(), SequencerPhase::Triggered);
        assert_eq!(seq.outstanding(), 3);

        let settled_at = world.drain(&mut seq, 0.0);
        assert_eq!(seq.phase(), SequencerPhase::Idle);
        assert!(settled_at <= CRATER_PAINT_DURATION as f64 + 2.0 * FRAME_DT as f64);
        assert_eq!(world.ledger.live_count(), 0);
    }

    #[test]
    fn test_water_impact_adds_tsunami() {
        let mut world = World::new(solid([10, 40, 200, 255]));
        let mut seq = ImpactEffectsSequencer::new();
        seq.arm(&mut world.classifier);

        let outcome = seq.handle_impact(&impact(), world.targets(0.0)).unwrap();
        assert_eq!(outcome.tsunami.len(), MAX_WAVES as usize);
        assert_eq!(seq.outstanding(), 3 + MAX_WAVES as usize);

        world.drain(&mut seq, 0.0);
        assert_eq!(world.effects.live_count(), 0);
        assert_eq!(world.ledger.live_count(), 0);
    }

    /// Left half water, right half land; the coast runs along the +X meridian
    fn coastline() -> SurfaceClassifier {
        let (w, h) = (64, 32);
        let pixels = (0..w * h)
            .map(|i| if i % w < w / 2 { [10, 40, 200, 255] } else { [40, 160, 40, 255] })
            .collect();
        SurfaceClassifier::from_texture(SurfaceTexture::from_pixels(w, h, pixels).unwrap())
    }

    #[test]
    fn test_coastal_land_impact_still_raises_tsunami() {
        let mut world = World::new(coastline());
        let mut seq = ImpactEffectsSequencer::new();
        seq.arm(&mut world.classifier);

        // Just on the land side; one tangent sample lands in the water
        let angle = 0.06f32;
        let point = Vec3::new(angle.cos(), 0.0, angle.sin()) * PRIMARY_RADIUS;
        let event = ImpactEvent {
            local_point: point,
            world_point: point,
            ..impact()
        };
        let outcome = seq.handle_impact(&event, world.targets(0.0)).unwrap();
        let classification = outcome.classification.expect("texture is loaded");
        assert_eq!(classification.class, SurfaceClass::Land);
        assert!(classification.strength > 0.0 && classification.strength < 1.0);

        let expected = world.tsunami.wave_count(classification.strength) as usize;
        assert!(expected > 0);
        assert_eq!(outcome.tsunami.len(), expected);
        assert_eq!(world.effects.count_kind(EffectKind::TsunamiHump), expected);
        assert_eq!(seq.outstanding(), 3 + expected);
    }

    #[test]
    fn test_deferred_coastal_classification_spawns_waves() {
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let mut world = World::new(SurfaceClassifier::from_receiver(rx));
        let mut seq = ImpactEffectsSequencer::new();
        let cycle = seq.arm(&mut world.classifier);
        seq.handle_impact(&impact(), world.targets(0.0)).unwrap();

        let coast = Classification {
            class: SurfaceClass::Land,
            strength: 0.2,
            anchor: impact().local_point,
        };
        let waves = seq
            .on_classified(cycle, &coast, &mut world.effects, &mut world.ledger, &world.tsunami, 0.1)
            .expect("current cycle");
        assert_eq!(waves.len(), world.tsunami.wave_count(0.2) as usize);
        assert_eq!(waves.len(), 1);

        // No water anywhere: nothing to spawn
        let mut seq = ImpactEffectsSequencer::new();
        let (_tx, rx) = crossbeam_channel::bounded(1);
        world.classifier = SurfaceClassifier::from_receiver(rx);
        let cycle = seq.arm(&mut world.classifier);
        seq.handle_impact(&impact(), world.targets(1.0)).unwrap();
        let dry = Classification::land(impact().local_point);
        let waves = seq
            .on_classified(cycle, &dry, &mut world.effects, &mut world.ledger, &world.tsunami, 1.1)
            .expect("current cycle");
        assert!(waves.is_empty());
    }

    #[test]
    fn test_impact_without_arm_is_ignored() {
        let mut world = World::new(SurfaceClassifier::unavailable());
        let mut seq = ImpactEffectsSequencer::new();
        assert!(seq.handle_impact(&impact(), world.targets(0.0)).is_none());
        assert_eq!(world.effects.live_count(), 0);
    }

    #[test]
    fn test_deferred_classification_and_stale_drop() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut world = World::new(SurfaceClassifier::from_receiver(rx));
        let mut seq = ImpactEffectsSequencer::new();

        let first = seq.arm(&mut world.classifier);
        seq.handle_impact(&impact(), world.targets(0.0)).unwrap();
        assert!(seq.is_awaiting_classification());
        assert!(seq.settle().is_none(), "cannot drain before classification");

        // Respawn before the texture arrives: the old request is cancelled
        let second = seq.arm(&mut world.classifier);
        assert!(second > first);
        assert!(!world.classifier.has_pending());

        // A late answer tagged with the old cycle is dropped
        let water = Classification {
            class: SurfaceClass::Water,
            strength: 1.0,
            anchor: impact().local_point,
        };
        let dropped = seq.on_classified(
            first,
            &water,
            &mut world.effects,
            &mut world.ledger,
            &world.tsunami,
            0.1,
        );
        assert!(dropped.is_none());
        assert_eq!(world.effects.count_kind(EffectKind::TsunamiHump), 0);

        drop(tx);
    }

    #[test]
    fn test_old_cycle_disposals_do_not_count() {
        let mut world = World::new(solid([40, 160, 40, 255]));
        let mut seq = ImpactEffectsSequencer::new();
        seq.arm(&mut world.classifier);
        seq.handle_impact(&impact(), world.targets(0.0)).unwrap();

        let new_cycle = seq.arm(&mut world.classifier);
        seq.handle_impact(&impact(), world.targets(1.0)).unwrap();
        assert_eq!(seq.outstanding(), 3);

        // Only the glow of the first cycle has finished by now
        let disposed = world.effects.advance(2.0, &mut world.ledger);
        assert!(disposed.iter().all(|d| d.owner != new_cycle));
        seq.on_disposed(&disposed);
        assert_eq!(seq.outstanding(), 3);
    }

    #[test]
    fn test_disarm_returns_to_idle() {
        let mut classifier = SurfaceClassifier::unavailable();
        let mut seq = ImpactEffectsSequencer::new();
        seq.arm(&mut classifier);
        seq.disarm();
        assert_eq!(seq.phase(), SequencerPhase::Idle);
    }
}

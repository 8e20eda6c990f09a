//! Simulation state and core data types
//!
//! Everything the frame tick touches lives in one [`SimulationState`]:
//! the primary body, the (at most one) projectile in flight, the effects
//! scheduler, and the collaborators that feed them.

use glam::{Quat, Vec3};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::classifier::{SurfaceClass, SurfaceClassifier};
use super::crater::SurfaceDeformer;
use super::effects::{EffectKind, EffectScheduler};
use super::mesh::SurfaceMesh;
use super::orbit::OrbitPropagator;
use super::resources::{ResourceHandle, ResourceLedger};
use super::sequencer::{ImpactEffectsSequencer, SequencerPhase};
use super::tsunami::TsunamiWaveGenerator;
use crate::consts::*;
use crate::estimate::{EstimateService, HttpEstimator, ImpactEstimate, ImpactEstimator};
use crate::settings::Settings;

/// Projectile composition (visual color and estimate density only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DensityClass {
    #[default]
    Stony,
    Iron,
    Carbonaceous,
}

impl DensityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DensityClass::Stony => "Stony",
            DensityClass::Iron => "Iron",
            DensityClass::Carbonaceous => "Carbonaceous",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stony" | "s" | "s-type" => Some(DensityClass::Stony),
            "iron" | "m" | "m-type" => Some(DensityClass::Iron),
            "carbonaceous" | "c" | "c-type" => Some(DensityClass::Carbonaceous),
            _ => None,
        }
    }

    /// Bulk density (kg/m³)
    pub fn density_kg_m3(&self) -> f64 {
        match self {
            DensityClass::Stony => 3000.0,
            DensityClass::Iron => 7800.0,
            DensityClass::Carbonaceous => 1700.0,
        }
    }

    /// Base surface color
    pub fn color(&self) -> Vec3 {
        match self {
            DensityClass::Stony => Vec3::new(0.53, 0.53, 0.53),
            DensityClass::Iron => Vec3::new(0.62, 0.6, 0.58),
            DensityClass::Carbonaceous => Vec3::new(0.2, 0.19, 0.18),
        }
    }
}

/// Request to create a new projectile (replaces any current one)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnCommand {
    pub diameter_km: f32,
    /// Approach speed (or delta-v) in km/s
    pub velocity_km_s: f32,
    pub asteroid_type: DensityClass,
    /// Direction from the primary's center to spawn along; random if `None`.
    /// When set, gravity-mode launches aim straight down this direction.
    #[serde(default)]
    pub aim: Option<Vec3>,
}

impl SpawnCommand {
    pub fn new(diameter_km: f32, velocity_km_s: f32, asteroid_type: DensityClass) -> Self {
        Self {
            diameter_km,
            velocity_km_s,
            asteroid_type,
            aim: None,
        }
    }

    pub fn aimed_at(mut self, direction: Vec3) -> Self {
        self.aim = Some(direction);
        self
    }

    /// Clamp into the valid range; invalid values become the minimum
    pub fn sanitized(&self) -> Self {
        let clamp = |v: f32, min: f32, max: f32| if v.is_finite() { v.clamp(min, max) } else { min };
        Self {
            diameter_km: clamp(self.diameter_km, MIN_DIAMETER_KM, MAX_DIAMETER_KM),
            velocity_km_s: clamp(self.velocity_km_s, MIN_VELOCITY_KM_S, MAX_VELOCITY_KM_S),
            asteroid_type: self.asteroid_type,
            aim: self.aim.and_then(Vec3::try_normalize),
        }
    }

    /// Scene-unit radius for this diameter
    pub fn projectile_radius(&self) -> f32 {
        PROJECTILE_BASE_RADIUS + PROJECTILE_RADIUS_PER_KM * self.diameter_km
    }
}

/// The small body in flight (world frame)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    pub density: DensityClass,
    /// Rotation applied to the 2D orbit path (decaying-orbit mode)
    pub orbit_plane: Option<Quat>,
    /// Requested size and speed, kept for estimates
    pub diameter_km: f32,
    pub velocity_km_s: f32,
    /// Visual tumble angle (radians)
    pub spin: f32,
    /// Seed for the procedural asteroid shape
    pub shape_seed: u64,
    /// Mesh + material of the projectile
    pub visual: Option<ResourceHandle>,
}

/// Predicted trajectory drawn while the projectile is in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitPath {
    pub points: Vec<Vec3>,
    pub resource: ResourceHandle,
}

/// The large fixed sphere at the origin
#[derive(Debug, Clone)]
pub struct PrimaryBody {
    pub radius: f32,
    pub mesh: SurfaceMesh,
    /// Spin about +Y (radians, monotonic)
    pub rotation_angle: f32,
    pub rotation_speed: f32,
}

impl PrimaryBody {
    pub fn new(radius: f32, subdivisions: u32, rotation_speed: f32) -> Self {
        Self {
            radius,
            mesh: SurfaceMesh::icosphere(radius, subdivisions),
            rotation_angle: 0.0,
            rotation_speed,
        }
    }

    pub fn rotate(&mut self, dt: f32) {
        self.rotation_angle += self.rotation_speed * dt;
    }

    /// Local -> world rotation
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.rotation_angle)
    }

    pub fn world_to_local(&self, p: Vec3) -> Vec3 {
        self.rotation().inverse() * p
    }

    pub fn local_to_world(&self, p: Vec3) -> Vec3 {
        self.rotation() * p
    }
}

/// Contact between projectile and primary; produced once per projectile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactEvent {
    /// Impact point on the undeformed surface, primary's local frame
    pub local_point: Vec3,
    /// Same point, world frame, at the moment of impact
    pub world_point: Vec3,
    pub crater_radius: f32,
    pub crater_depth: f32,
    /// Speed at contact (scene units/sec)
    pub impact_speed: f32,
    /// Angle between trajectory and the local surface plane (90 = vertical)
    pub impact_angle_deg: f32,
    pub projectile_radius: f32,
    pub diameter_km: f32,
    pub velocity_km_s: f32,
    pub density: DensityClass,
}

/// Things that happened during a tick, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    Spawned { cycle: u64 },
    /// A projectile was discarded before impact
    ProjectileCancelled { cycle: u64 },
    Impact { cycle: u64, event: ImpactEvent },
    Classified { cycle: u64, class: SurfaceClass, strength: f32 },
    TsunamiSpawned { cycle: u64, waves: u32 },
    EffectComplete { id: u64, kind: EffectKind },
    EstimateReceived { cycle: u64, estimate: ImpactEstimate },
    /// Every effect of the cycle has been disposed
    CycleComplete { cycle: u64 },
}

/// Non-fatal conditions surfaced to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    /// Spawn parameters were out of range and have been clamped
    ParametersClamped { requested: SpawnCommand, used: SpawnCommand },
    /// The remote estimate failed; local estimates still apply
    EstimateUnavailable(String),
}

/// Read-only view for the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub time: f64,
    pub phase: SequencerPhase,
    pub cycle: u64,
    pub projectile_position: Option<Vec3>,
    pub projectile_radius: Option<f32>,
    pub primary_rotation: f32,
    pub live_effects: usize,
    pub live_resources: usize,
    pub impacts: u64,
    pub last_impact: Option<ImpactEvent>,
    pub last_estimate: Option<ImpactEstimate>,
}

/// Complete simulation state, owned by the frame driver
pub struct SimulationState {
    pub settings: Settings,
    /// Seconds since start
    pub time: f64,
    pub primary: PrimaryBody,
    /// Owns the projectile; `None` when nothing is in flight
    pub propagator: Option<OrbitPropagator>,
    pub orbit_path: Option<OrbitPath>,
    pub sequencer: ImpactEffectsSequencer,
    pub effects: EffectScheduler,
    pub classifier: SurfaceClassifier,
    pub tsunami: TsunamiWaveGenerator,
    pub deformer: SurfaceDeformer,
    pub ledger: ResourceLedger,
    pub estimates: Option<EstimateService>,
    pub rng: Pcg32,
    pub impacts: u64,
    pub last_impact: Option<ImpactEvent>,
    pub last_estimate: Option<ImpactEstimate>,
    pub(crate) queued_spawn: Option<SpawnCommand>,
    pub(crate) events: Vec<SimEvent>,
    pub(crate) notices: Vec<Notice>,
}

impl SimulationState {
    /// Build the scene. Starts the texture decode and estimate worker if configured.
    pub fn new(settings: Settings) -> Self {
        let classifier = match &settings.texture_path {
            Some(path) => SurfaceClassifier::load_async(path.clone()),
            None => SurfaceClassifier::unavailable(),
        };
        let estimates = settings
            .estimate_service_url
            .as_ref()
            .and_then(|url| match HttpEstimator::new(url.as_str()) {
                Ok(http) => EstimateService::start(http),
                Err(e) => {
                    log::warn!("Remote estimates disabled: {e}");
                    None
                }
            });

        let primary = PrimaryBody::new(
            PRIMARY_RADIUS,
            settings.quality.mesh_subdivisions(),
            settings.rotation_speed,
        );
        let tsunami = TsunamiWaveGenerator::new(
            settings.max_waves,
            settings.quality.humps_per_ring(),
            primary.radius,
        );

        log::info!(
            "Simulation ready: {} surface triangles, {:?} propagation",
            primary.mesh.triangle_count(),
            settings.propagation
        );

        Self {
            rng: Pcg32::seed_from_u64(settings.seed),
            settings,
            time: 0.0,
            primary,
            propagator: None,
            orbit_path: None,
            sequencer: ImpactEffectsSequencer::new(),
            effects: EffectScheduler::new(),
            classifier,
            tsunami,
            deformer: SurfaceDeformer::default(),
            ledger: ResourceLedger::new(),
            estimates,
            impacts: 0,
            last_impact: None,
            last_estimate: None,
            queued_spawn: None,
            events: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Replace the surface classifier (e.g. with an in-memory texture)
    pub fn with_classifier(mut self, classifier: SurfaceClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Route impact estimates through `estimator` on a worker thread
    pub fn with_estimator(mut self, estimator: impl ImpactEstimator + 'static) -> Self {
        self.estimates = EstimateService::start(estimator);
        self
    }

    /// Queue a spawn for the next tick (a later call before then wins)
    pub fn spawn(&mut self, command: SpawnCommand) {
        self.queued_spawn = Some(command);
    }

    pub fn projectile(&self) -> Option<&Projectile> {
        self.propagator.as_ref().map(OrbitPropagator::projectile)
    }

    /// Number of live projectiles (0 or 1)
    pub fn projectile_count(&self) -> usize {
        usize::from(self.propagator.is_some())
    }

    pub fn query_state(&self) -> StateSnapshot {
        let projectile = self.projectile();
        StateSnapshot {
            time: self.time,
            phase: self.sequencer.phase(),
            cycle: self.sequencer.cycle(),
            projectile_position: projectile.map(|p| p.position),
            projectile_radius: projectile.map(|p| p.radius),
            primary_rotation: self.primary.rotation_angle,
            live_effects: self.effects.live_count(),
            live_resources: self.ledger.live_count(),
            impacts: self.impacts,
            last_impact: self.last_impact,
            last_estimate: self.last_estimate.clone(),
        }
    }

    /// Take the events recorded since the last call
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take the user notices recorded since the last call
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_command_clamps_invalid_values() {
        let cmd = SpawnCommand::new(-3.0, 0.0, DensityClass::Iron).sanitized();
        assert_eq!(cmd.diameter_km, MIN_DIAMETER_KM);
        assert_eq!(cmd.velocity_km_s, MIN_VELOCITY_KM_S);

        let cmd = SpawnCommand::new(f32::NAN, 1000.0, DensityClass::Stony).sanitized();
        assert_eq!(cmd.diameter_km, MIN_DIAMETER_KM);
        assert_eq!(cmd.velocity_km_s, MAX_VELOCITY_KM_S);
    }

    #[test]
    fn test_zero_aim_is_dropped() {
        let cmd = SpawnCommand::new(1.0, 5.0, DensityClass::Stony)
            .aimed_at(Vec3::ZERO)
            .sanitized();
        assert_eq!(cmd.aim, None);
    }

    #[test]
    fn test_projectile_radius_grows_with_diameter() {
        let small = SpawnCommand::new(1.0, 5.0, DensityClass::Stony).projectile_radius();
        let large = SpawnCommand::new(20.0, 5.0, DensityClass::Stony).projectile_radius();
        assert!(large > small);
        assert!((large - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_primary_frames_round_trip() {
        let mut primary = PrimaryBody::new(PRIMARY_RADIUS, 1, 0.5);
        primary.rotate(1.0);
        let world = Vec3::new(3.0, 4.0, 5.0);
        let back = primary.local_to_world(primary.world_to_local(world));
        assert!((back - world).length() < 1e-5);
        assert!(primary.rotation_angle > 0.0);
    }

    #[test]
    fn test_density_class_parse() {
        assert_eq!(DensityClass::parse("IRON"), Some(DensityClass::Iron));
        assert_eq!(DensityClass::parse("c-type"), Some(DensityClass::Carbonaceous));
        assert_eq!(DensityClass::parse("ice"), None);
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = SimulationState::new(Settings::from_preset(crate::QualityPreset::Low));
        let snapshot = state.query_state();
        assert_eq!(snapshot.phase, SequencerPhase::Idle);
        assert_eq!(snapshot.projectile_position, None);
        assert_eq!(snapshot.live_resources, 0);
        assert_eq!(state.projectile_count(), 0);
    }
}

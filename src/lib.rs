//! Impact Sim - a projectile falling onto a planet, and everything that happens after
//!
//! Core modules:
//! - `sim`: Frame-driven simulation (orbit propagation, cratering, effects, sequencing)
//! - `renderer`: CPU-side geometry for the presentation layer
//! - `estimate`: Local and remote impact estimates (advisory only)
//! - `settings`: Data-driven simulation tuning

pub mod error;
pub mod estimate;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, EstimateError, TextureError};
pub use settings::{PropagationMode, QualityPreset, Settings};

use glam::{Vec2, Vec3};

/// Simulation configuration constants (scene units unless noted)
pub mod consts {
    /// Nominal frame timestep (60 Hz)
    pub const FRAME_DT: f32 = 1.0 / 60.0;
    /// Longest frame the simulation will integrate in one tick
    pub const MAX_FRAME_DT: f32 = 1.0 / 30.0;

    /// Primary body
    pub const PRIMARY_RADIUS: f32 = 15.0;
    /// Primary spin about its Y axis (radians/sec)
    pub const PRIMARY_ROTATION_SPEED: f32 = 0.03;

    /// G * M, scaled to scene units
    pub const GRAVITY_PARAMETER: f32 = 2000.0;
    /// Distance from the primary's center where projectiles appear
    pub const SPAWN_DISTANCE: f32 = 60.0;
    /// Scene units per second for each km/s of requested speed
    pub const VELOCITY_SCALE: f32 = 1.5;
    /// Max lateral aim offset, as a fraction of the primary radius (< 1 always hits)
    pub const AIM_SPREAD: f32 = 0.6;

    /// Decaying-orbit mode: radius shrink per second, per km/s of requested speed
    pub const DECAY_RATE_PER_SPEED: f32 = 0.35;
    /// Decaying-orbit mode: angular speed (radians/sec)
    pub const ORBIT_ANGULAR_SPEED: f32 = 0.8;

    /// Spawn parameter limits (clamped, never rejected)
    pub const MIN_DIAMETER_KM: f32 = 0.01;
    pub const MAX_DIAMETER_KM: f32 = 20.0;
    pub const MIN_VELOCITY_KM_S: f32 = 1.0;
    pub const MAX_VELOCITY_KM_S: f32 = 40.0;

    /// Projectile radius = base + per_km * diameter_km
    pub const PROJECTILE_BASE_RADIUS: f32 = 0.3;
    pub const PROJECTILE_RADIUS_PER_KM: f32 = 0.06;
    /// Asteroid surface noise (fraction of radius)
    pub const PROJECTILE_BUMPINESS: f32 = 0.4;
    /// Visual tumble (radians/sec)
    pub const PROJECTILE_SPIN_SPEED: f32 = 0.03;

    /// Crater sizing relative to projectile radius
    pub const CRATER_RADIUS_FACTOR: f32 = 5.0;
    pub const CRATER_DEPTH_FACTOR: f32 = 2.75;

    /// Blast rings
    pub const BLAST_RING_COUNT: usize = 4;
    pub const BLAST_DURATION: f32 = 4.0;
    pub const BLAST_STAGGER: f32 = 0.1;
    /// Outermost ring radius as a multiple of crater radius
    pub const BLAST_RADIUS_FACTOR: f32 = 2.0;

    /// Glow burst
    pub const GLOW_DURATION: f32 = 1.6;
    pub const GLOW_OPACITY: f32 = 0.45;
    pub const GLOW_RADIUS_FACTOR: f32 = 0.7;

    /// Crater paint decal
    pub const CRATER_PAINT_DURATION: f32 = 5.0;

    /// Tsunami
    pub const MAX_WAVES: u32 = 3;
    pub const WAVE_DURATION: f32 = 5.0;
    pub const WAVE_STAGGER: f32 = 0.5;
    pub const WAVE_OPACITY: f32 = 0.8;
    pub const WAVE_RING_SPACING: f32 = 1.2;
    pub const HUMP_AMPLITUDE: f32 = 0.25;
    pub const HUMP_FREQUENCY: f32 = 4.0;
    pub const HUMP_SPEED: f32 = 1.5;
    pub const HUMP_MAX_OFFSET: f32 = 6.0;
    pub const HUMP_LIFT: f32 = 0.3;
    pub const HUMP_SIZE: f32 = 0.35;

    /// Blue must exceed red and green by this much for a texel to count as water
    pub const WATER_MARGIN: u8 = 10;
    /// Spacing of the classifier's neighbor samples around the impact point
    pub const CLASSIFY_SAMPLE_OFFSET: f32 = 1.0;
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Quadratic ease-in: slow start, fast finish
#[inline]
pub fn ease_in(t: f32) -> f32 {
    t * t
}

/// Equirectangular texture coordinates for a direction from the sphere's center.
///
/// `u = 0.5 + atan2(z, x) / 2π`, `v = 0.5 - asin(y) / π`.
pub fn equirect_uv(dir: Vec3) -> Vec2 {
    let p = dir.normalize_or_zero();
    let u = 0.5 + p.z.atan2(p.x) / std::f32::consts::TAU;
    let v = 0.5 - p.y.clamp(-1.0, 1.0).asin() / std::f32::consts::PI;
    Vec2::new(u, v)
}

/// Two unit tangents perpendicular to `normal` and to each other (Gram-Schmidt).
pub fn tangent_basis(normal: Vec3) -> (Vec3, Vec3) {
    let n = normal.normalize_or_zero();
    let reference = if n.y.abs() > 0.99 { Vec3::X } else { Vec3::Y };
    let t1 = (reference - n * reference.dot(n)).normalize();
    let t2 = n.cross(t1);
    (t1, t2)
}

/// Latitude/longitude in degrees of a point relative to the sphere's center
pub fn lat_lon_deg(p: Vec3) -> (f32, f32) {
    let n = p.normalize_or_zero();
    let lat = n.y.clamp(-1.0, 1.0).asin().to_degrees();
    let lon = n.z.atan2(n.x).to_degrees();
    (lat, lon)
}

//! Tsunami waves: rings of humps that travel outward from a water impact
//!
//! Each ring is one [`EffectKind::TsunamiHump`](super::effects::EffectKind)
//! effect. Humps start evenly spaced on a circle around the impact point,
//! slide outward along the surface, bob with a sine wave, and fade out.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::effects::{
    Animation, EffectHandle, EffectParams, EffectScheduler, Easing, Primitive, PrimitiveShape,
};
use super::resources::ResourceLedger;
use crate::consts::*;
use crate::tangent_basis;

/// Tuning for one ring of humps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumpRingParams {
    pub ring_index: u32,
    /// Tangential distance of the ring from the impact point at spawn
    pub ring_radius: f32,
    pub humps: usize,
    /// Radius of the sphere the humps ride on
    pub surface_radius: f32,
    /// Height above the surface at rest
    pub lift: f32,
    pub amplitude: f32,
    /// Bob angular frequency (radians/sec)
    pub frequency: f32,
    /// Outward travel speed (scene units/sec)
    pub speed: f32,
    /// Outward travel limit
    pub max_offset: f32,
    pub size: f32,
    pub color: Vec3,
    pub opacity: f32,
    pub delay: f32,
    pub duration: f32,
}

/// Place the humps of one ring around `anchor`
pub fn build_ring(anchor: Vec3, p: &HumpRingParams) -> Vec<Primitive> {
    let normal = anchor.normalize_or_zero();
    let (t1, t2) = tangent_basis(normal);
    let center = normal * p.surface_radius;

    (0..p.humps)
        .map(|k| {
            let angle = TAU * k as f32 / p.humps as f32;
            let outward = t1 * angle.cos() + t2 * angle.sin();
            let surface = (center + outward * p.ring_radius).normalize();
            let position = surface * (p.surface_radius + p.lift);

            let anim = Animation {
                delay: p.delay,
                duration: p.duration,
                start_scale: p.size,
                end_scale: p.size,
                start_opacity: p.opacity,
                easing: Easing::Linear,
            };
            let mut prim = Primitive::new(PrimitiveShape::Hump, p.color, position, surface, anim);
            prim.outward = outward;
            prim.phase = angle + p.ring_index as f32 * FRAC_PI_2;
            prim
        })
        .collect()
}

/// Outward offset after `elapsed` seconds, clamped to `max_offset`
#[inline]
pub fn travel(p: &HumpRingParams, elapsed: f32) -> f32 {
    (p.speed * elapsed.max(0.0)).min(p.max_offset)
}

/// Hump update: slide outward, bob, fade
pub fn update_hump(prim: &mut Primitive, t: f32, elapsed: f32, params: &EffectParams) {
    let EffectParams::TsunamiHump(p) = params else {
        return;
    };

    let surface = (prim.base_position + prim.outward * travel(p, elapsed)).normalize_or_zero();
    let bob = p.amplitude * (p.frequency * elapsed + prim.phase).sin();

    prim.normal = surface;
    prim.position = surface * (p.surface_radius + p.lift + bob);
    prim.scale = prim.anim.scale_at(t);
    prim.opacity = prim.anim.opacity_at(t);
}

/// Spawns tsunami rings for water impacts
#[derive(Debug, Clone)]
pub struct TsunamiWaveGenerator {
    /// Rings at full strength
    pub max_waves: u32,
    pub humps_per_ring: usize,
    pub surface_radius: f32,
}

impl TsunamiWaveGenerator {
    pub fn new(max_waves: u32, humps_per_ring: usize, surface_radius: f32) -> Self {
        Self {
            max_waves,
            humps_per_ring: humps_per_ring.max(1),
            surface_radius,
        }
    }

    /// `round(max_waves * strength)`
    pub fn wave_count(&self, strength: f32) -> u32 {
        (self.max_waves as f32 * strength.clamp(0.0, 1.0)).round() as u32
    }

    /// Parameters for ring `index` (0 = innermost, first to start)
    pub fn ring_params(&self, index: u32) -> HumpRingParams {
        HumpRingParams {
            ring_index: index,
            ring_radius: WAVE_RING_SPACING * (index + 1) as f32,
            humps: self.humps_per_ring,
            surface_radius: self.surface_radius,
            lift: HUMP_LIFT,
            amplitude: HUMP_AMPLITUDE,
            frequency: HUMP_FREQUENCY,
            speed: HUMP_SPEED,
            max_offset: HUMP_MAX_OFFSET,
            size: HUMP_SIZE,
            color: Vec3::new(0.4, 0.8, 1.0),
            opacity: WAVE_OPACITY,
            delay: WAVE_STAGGER * index as f32,
            duration: WAVE_DURATION,
        }
    }

    /// Seconds from spawn until the last ring is gone
    pub fn total_duration(&self, strength: f32) -> f32 {
        match self.wave_count(strength) {
            0 => 0.0,
            n => WAVE_STAGGER * (n - 1) as f32 + WAVE_DURATION,
        }
    }

    /// Spawn `round(max_waves * strength)` rings around `anchor`; no-op at zero strength.
    pub fn spawn(
        &self,
        anchor: Vec3,
        strength: f32,
        owner: u64,
        now: f64,
        scheduler: &mut EffectScheduler,
        ledger: &mut ResourceLedger,
    ) -> Vec<EffectHandle> {
        let waves = self.wave_count(strength);
        if waves == 0 {
            return Vec::new();
        }

        log::info!("Tsunami: {} rings (strength {:.0}%)", waves, strength * 100.0);
        (0..waves)
            .map(|i| {
                let params = EffectParams::TsunamiHump(self.ring_params(i));
                scheduler.spawn(anchor, params, owner, now, ledger)
            })
            .collect()
    }
}

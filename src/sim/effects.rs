//! Timed, self-disposing visual effects
//!
//! An [`Effect`] is a tagged variant: its [`EffectKind`] selects the update
//! function and its [`EffectParams`] carry the per-kind tuning. The
//! [`EffectScheduler`] owns every live effect and is advanced once per tick;
//! cancelling an effect is just removing it from the list.
//!
//! Each effect is made of one or more [`Primitive`]s anchored in the
//! primary's local frame. A primitive's clock starts after its own delay,
//! and it releases its graphical resource exactly once, the first tick its
//! normalized time reaches 1. An effect is complete when all of its
//! primitives are released.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::resources::{ResourceHandle, ResourceLedger};
use super::tsunami;
use crate::consts::*;
use crate::lerp;

/// Unique effect id
pub type EffectId = u64;

/// Effect variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Concentric colored rings expanding from the impact point
    BlastRings,
    /// Short-lived hot sphere at the impact point
    Glow,
    /// Dark decal growing to the crater radius
    CraterPaint,
    /// One ring of tsunami humps
    TsunamiHump,
}

/// Per-primitive update: `(primitive, normalized t, seconds since the primitive started, params)`
pub type UpdateFn = fn(&mut Primitive, f32, f32, &EffectParams);

impl EffectKind {
    /// Dispatch table: kind -> update function
    pub fn updater(self) -> UpdateFn {
        match self {
            EffectKind::BlastRings | EffectKind::Glow | EffectKind::CraterPaint => update_radial,
            EffectKind::TsunamiHump => tsunami::update_hump,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::BlastRings => "blast-rings",
            EffectKind::Glow => "glow",
            EffectKind::CraterPaint => "crater-paint",
            EffectKind::TsunamiHump => "tsunami",
        }
    }
}

/// Time remapping applied to scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    #[default]
    Linear,
    /// t², slow start
    EaseIn,
}

impl Easing {
    #[inline]
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::EaseIn => crate::ease_in(t),
        }
    }
}

/// What the presentation layer draws for a primitive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveShape {
    /// Filled circle facing along `normal`, radius = `scale`
    Disc,
    /// Annulus facing along `normal`, outer radius = `scale`
    Ring { inner_ratio: f32 },
    /// Sphere, radius = `scale`
    Sphere,
    /// Small raised wave marker, radius = `scale`
    Hump,
}

/// Scale/opacity curve of one primitive
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Animation {
    /// Seconds after the effect starts before this primitive appears
    pub delay: f32,
    pub duration: f32,
    pub start_scale: f32,
    pub end_scale: f32,
    pub start_opacity: f32,
    pub easing: Easing,
}

impl Animation {
    /// `scale(t) = lerp(start, end, ease(t))`
    pub fn scale_at(&self, t: f32) -> f32 {
        lerp(self.start_scale, self.end_scale, self.easing.apply(t))
    }

    /// `opacity(t) = lerp(start, 0, t)`
    pub fn opacity_at(&self, t: f32) -> f32 {
        lerp(self.start_opacity, 0.0, t)
    }
}

/// A single renderable piece of an effect (local frame)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    pub shape: PrimitiveShape,
    pub color: Vec3,
    /// Where the primitive was placed at spawn
    pub base_position: Vec3,
    /// Current position
    pub position: Vec3,
    /// Outward surface normal the primitive faces
    pub normal: Vec3,
    /// Tangential travel direction (humps only)
    pub outward: Vec3,
    /// Bob phase offset (humps only)
    pub phase: f32,
    pub anim: Animation,
    pub scale: f32,
    pub opacity: f32,
    /// False until the primitive's delay has passed
    pub visible: bool,
    /// `None` once released
    pub resource: Option<ResourceHandle>,
}

impl Primitive {
    /// A primitive at rest at `position`, facing `normal`
    pub fn new(shape: PrimitiveShape, color: Vec3, position: Vec3, normal: Vec3, anim: Animation) -> Self {
        Self {
            shape,
            color,
            base_position: position,
            position,
            normal,
            outward: Vec3::ZERO,
            phase: 0.0,
            anim,
            scale: anim.start_scale,
            opacity: anim.start_opacity,
            visible: false,
            resource: None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.resource.is_none()
    }

    /// Seconds from effect start until this primitive expires
    pub fn end_time(&self) -> f32 {
        self.anim.delay + self.anim.duration
    }
}

/// Red, orange, yellow, white; innermost first
pub const BLAST_RING_COLORS: [Vec3; BLAST_RING_COUNT] = [
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(1.0, 0.65, 0.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::ONE,
];

/// Expanding concentric rings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingParams {
    /// One ring per color, innermost first
    pub colors: Vec<Vec3>,
    /// Final radius of the outermost ring
    pub max_radius: f32,
    pub start_radius: f32,
    pub duration: f32,
    /// Delay between consecutive rings
    pub stagger: f32,
    pub base_opacity: f32,
    /// Opacity drop per ring
    pub opacity_step: f32,
}

impl RingParams {
    /// Rings sized from the crater
    pub fn for_crater(crater_radius: f32) -> Self {
        Self {
            colors: BLAST_RING_COLORS.to_vec(),
            max_radius: crater_radius * BLAST_RADIUS_FACTOR,
            start_radius: 0.25,
            duration: BLAST_DURATION,
            stagger: BLAST_STAGGER,
            base_opacity: 0.8,
            opacity_step: 0.15,
        }
    }
}

/// Hot glow burst
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlowParams {
    pub color: Vec3,
    pub radius: f32,
    /// Final radius as a multiple of `radius`
    pub growth: f32,
    pub opacity: f32,
    pub duration: f32,
}

impl GlowParams {
    pub fn for_crater(crater_radius: f32) -> Self {
        Self {
            color: Vec3::new(1.0, 0.67, 0.2),
            radius: crater_radius * GLOW_RADIUS_FACTOR,
            growth: 1.5,
            opacity: GLOW_OPACITY,
            duration: GLOW_DURATION,
        }
    }
}

/// Crater floor decal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CraterPaintParams {
    pub color: Vec3,
    pub radius: f32,
    pub opacity: f32,
    pub duration: f32,
}

impl CraterPaintParams {
    pub fn for_crater(crater_radius: f32) -> Self {
        Self {
            color: Vec3::new(0.25, 0.15, 0.1),
            radius: crater_radius,
            opacity: 0.9,
            duration: CRATER_PAINT_DURATION,
        }
    }
}

/// Per-kind tuning; the variant determines the effect's kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EffectParams {
    BlastRings(RingParams),
    Glow(GlowParams),
    CraterPaint(CraterPaintParams),
    TsunamiHump(tsunami::HumpRingParams),
}

impl EffectParams {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectParams::BlastRings(_) => EffectKind::BlastRings,
            EffectParams::Glow(_) => EffectKind::Glow,
            EffectParams::CraterPaint(_) => EffectKind::CraterPaint,
            EffectParams::TsunamiHump(_) => EffectKind::TsunamiHump,
        }
    }

    /// Lay out the primitives for an effect anchored at `anchor`
    fn build(&self, anchor: Vec3) -> Vec<Primitive> {
        let normal = anchor.normalize_or_zero();
        match self {
            EffectParams::BlastRings(p) => {
                let count = p.colors.len().max(1) as f32;
                p.colors
                    .iter()
                    .enumerate()
                    .map(|(i, &color)| {
                        let anim = Animation {
                            delay: p.stagger * i as f32,
                            duration: p.duration,
                            start_scale: p.start_radius,
                            end_scale: p.max_radius / count * (i + 1) as f32,
                            start_opacity: (p.base_opacity - p.opacity_step * i as f32).max(0.05),
                            easing: Easing::Linear,
                        };
                        Primitive::new(PrimitiveShape::Ring { inner_ratio: 0.8 }, color, anchor, normal, anim)
                    })
                    .collect()
            }
            EffectParams::Glow(p) => {
                let anim = Animation {
                    delay: 0.0,
                    duration: p.duration,
                    start_scale: p.radius,
                    end_scale: p.radius * p.growth,
                    start_opacity: p.opacity,
                    easing: Easing::Linear,
                };
                vec![Primitive::new(PrimitiveShape::Sphere, p.color, anchor, normal, anim)]
            }
            EffectParams::CraterPaint(p) => {
                let anim = Animation {
                    delay: 0.0,
                    duration: p.duration,
                    start_scale: 0.0,
                    end_scale: p.radius,
                    start_opacity: p.opacity,
                    easing: Easing::Linear,
                };
                vec![Primitive::new(PrimitiveShape::Disc, p.color, anchor, normal, anim)]
            }
            EffectParams::TsunamiHump(p) => tsunami::build_ring(anchor, p),
        }
    }
}

/// Scale/opacity driven update shared by rings, glow and crater paint
fn update_radial(prim: &mut Primitive, t: f32, _elapsed: f32, _params: &EffectParams) {
    prim.scale = prim.anim.scale_at(t);
    prim.opacity = prim.anim.opacity_at(t);
}

/// A live effect
#[derive(Debug, Clone)]
pub struct Effect {
    pub id: EffectId,
    pub kind: EffectKind,
    pub params: EffectParams,
    /// Sequencer cycle that spawned the effect
    pub owner: u64,
    /// Anchor point in the primary's local frame
    pub anchor: Vec3,
    /// Simulation time at spawn (seconds)
    pub start_time: f64,
    /// Seconds until the last primitive expires
    pub duration: f32,
    pub primitives: Vec<Primitive>,
}

impl Effect {
    pub fn live_primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().filter(|p| !p.is_released())
    }

    pub fn is_complete(&self) -> bool {
        self.primitives.iter().all(Primitive::is_released)
    }
}

/// Returned by [`EffectScheduler::spawn`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectHandle {
    pub id: EffectId,
    pub kind: EffectKind,
}

/// Reported once when an effect's last primitive is released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposedEffect {
    pub id: EffectId,
    pub kind: EffectKind,
    pub owner: u64,
}

/// Owns every live effect; advanced once per tick
#[derive(Debug, Clone, Default)]
pub struct EffectScheduler {
    effects: Vec<Effect>,
    next_id: EffectId,
}

impl EffectScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an effect anchored at `anchor` (local frame).
    ///
    /// Each primitive gets its graphical resource immediately; it stays
    /// hidden until its delay has elapsed.
    pub fn spawn(
        &mut self,
        anchor: Vec3,
        params: EffectParams,
        owner: u64,
        now: f64,
        ledger: &mut ResourceLedger,
    ) -> EffectHandle {
        self.next_id += 1;
        let id = self.next_id;
        let kind = params.kind();

        let mut primitives = params.build(anchor);
        for prim in &mut primitives {
            prim.resource = Some(ledger.allocate());
        }
        let duration = primitives.iter().map(Primitive::end_time).fold(0.0, f32::max);

        log::debug!(
            "Spawned {} effect {} ({} primitives, {:.2}s)",
            kind.as_str(),
            id,
            primitives.len(),
            duration
        );

        self.effects.push(Effect {
            id,
            kind,
            params,
            owner,
            anchor,
            start_time: now,
            duration,
            primitives,
        });

        EffectHandle { id, kind }
    }

    /// Advance every effect to time `now`, releasing expired primitives.
    ///
    /// Returns the effects that completed during this call.
    pub fn advance(&mut self, now: f64, ledger: &mut ResourceLedger) -> Vec<DisposedEffect> {
        for effect in &mut self.effects {
            let elapsed = (now - effect.start_time) as f32;
            let update = effect.kind.updater();

            for prim in &mut effect.primitives {
                let Some(handle) = prim.resource else {
                    continue;
                };

                let local = elapsed - prim.anim.delay;
                if local < 0.0 {
                    continue;
                }
                if local >= prim.anim.duration {
                    // Detach and free exactly once
                    prim.visible = false;
                    prim.opacity = 0.0;
                    ledger.release(handle);
                    prim.resource = None;
                    continue;
                }

                let t = if prim.anim.duration > 0.0 {
                    (local / prim.anim.duration).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                prim.visible = true;
                update(prim, t, local, &effect.params);
            }
        }

        let mut disposed = Vec::new();
        self.effects.retain(|effect| {
            if effect.is_complete() {
                log::debug!("Effect {} ({}) complete", effect.id, effect.kind.as_str());
                disposed.push(DisposedEffect {
                    id: effect.id,
                    kind: effect.kind,
                    owner: effect.owner,
                });
                false
            } else {
                true
            }
        });
        disposed
    }

    pub fn get(&self, id: EffectId) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn is_live(&self, id: EffectId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn live_count(&self) -> usize {
        self.effects.len()
    }

    pub fn count_kind(&self, kind: EffectKind) -> usize {
        self.effects.iter().filter(|e| e.kind == kind).count()
    }
}

//! Frame-driven impact simulation
//!
//! Everything that changes state lives here and is advanced by [`tick`]:
//! - Timestep clamped per frame, seeded RNG only
//! - Effects and craters in the primary's local frame
//! - No rendering or platform dependencies; GPU-side work keys off [`ResourceHandle`]s

pub mod classifier;
pub mod crater;
pub mod effects;
pub mod mesh;
pub mod orbit;
pub mod resources;
pub mod sequencer;
pub mod state;
pub mod tick;
pub mod tsunami;

pub use classifier::{Classification, SurfaceClass, SurfaceClassifier, SurfaceTexture, classify_with};
pub use crater::{CarveReport, SurfaceDeformer};
pub use effects::{DisposedEffect, Effect, EffectHandle, EffectKind, EffectParams, EffectScheduler, Primitive, PrimitiveShape};
pub use mesh::SurfaceMesh;
pub use orbit::{OrbitPropagator, Propagation};
pub use resources::{ResourceHandle, ResourceLedger};
pub use sequencer::{ImpactEffectsSequencer, ImpactOutcome, ImpactTargets, SequencerPhase};
pub use state::{
    DensityClass, ImpactEvent, Notice, OrbitPath, PrimaryBody, Projectile, SimEvent, SimulationState, SpawnCommand,
    StateSnapshot,
};
pub use tick::{TickInput, tick};
pub use tsunami::TsunamiWaveGenerator;

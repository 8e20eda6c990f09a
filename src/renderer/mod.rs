//! CPU-side geometry for the presentation layer
//!
//! [`FrameBuilder`] turns a [`SimulationState`] into world-space triangle
//! lists, one batch per graphical resource, ready for upload with the
//! [`Vertex::desc`] layout. Surface and effects are rotated from the
//! primary's local frame into world space here.

pub mod shapes;
pub mod vertex;

pub use vertex::{Vertex, colors};

use glam::Vec3;

use crate::consts::PROJECTILE_BUMPINESS;
use crate::settings::QualityPreset;
use crate::sim::effects::PrimitiveShape;
use crate::sim::mesh::SurfaceMesh;
use crate::sim::resources::ResourceHandle;
use crate::sim::state::SimulationState;
use vertex::rgba;

/// Vertices drawn with one resource
#[derive(Debug, Clone)]
pub struct DrawBatch {
    pub resource: Option<ResourceHandle>,
    pub vertices: Vec<Vertex>,
}

/// Everything to draw this frame (world space)
#[derive(Debug, Clone, Default)]
pub struct FrameGeometry {
    pub surface: Vec<Vertex>,
    pub projectile: Option<DrawBatch>,
    pub orbit_path: Option<DrawBatch>,
    pub effects: Vec<DrawBatch>,
}

impl FrameGeometry {
    pub fn vertex_count(&self) -> usize {
        self.surface.len()
            + self.projectile.as_ref().map_or(0, |b| b.vertices.len())
            + self.orbit_path.as_ref().map_or(0, |b| b.vertices.len())
            + self.effects.iter().map(|b| b.vertices.len()).sum::<usize>()
    }
}

/// Builds frame geometry, caching the current asteroid mesh
pub struct FrameBuilder {
    segments: u32,
    asteroid: Option<(u64, SurfaceMesh)>,
}

impl FrameBuilder {
    pub fn new(quality: QualityPreset) -> Self {
        Self {
            segments: quality.circle_segments(),
            asteroid: None,
        }
    }

    pub fn build(&mut self, state: &SimulationState) -> FrameGeometry {
        let rotation = state.primary.rotation();
        let texture = state.classifier.texture();

        // Surface colors are the carve tint times the texture (or a flat fallback)
        let mesh = &state.primary.mesh;
        let surface = mesh
            .triangles()
            .into_iter()
            .flatten()
            .map(|i| {
                let base = match &texture {
                    Some(tex) => {
                        let [r, g, b, _] = tex.sample(mesh.positions[i]);
                        Vec3::new(r as f32, g as f32, b as f32) / 255.0
                    }
                    None => Vec3::from_slice(&colors::SURFACE[..3]),
                };
                Vertex::new(
                    rotation * mesh.positions[i],
                    rotation * mesh.normals[i],
                    rgba(base * mesh.colors[i], 1.0),
                )
            })
            .collect();

        let projectile = state.projectile().map(|p| {
            let stale = self.asteroid.as_ref().is_none_or(|(seed, _)| *seed != p.shape_seed);
            if stale {
                let rock = shapes::asteroid(p.shape_seed, p.radius, PROJECTILE_BUMPINESS, p.density.color(), 2);
                self.asteroid = Some((p.shape_seed, rock));
            }
            let vertices = match &self.asteroid {
                Some((_, rock)) => {
                    let spin = glam::Quat::from_rotation_y(p.spin) * glam::Quat::from_rotation_x(p.spin * 0.5);
                    shapes::mesh_vertices(rock, spin, p.position, [1.0; 4])
                }
                None => Vec::new(),
            };
            DrawBatch {
                resource: p.visual,
                vertices,
            }
        });
        if projectile.is_none() {
            self.asteroid = None;
        }

        let orbit_path = state.orbit_path.as_ref().map(|path| DrawBatch {
            resource: Some(path.resource),
            vertices: shapes::polyline(&path.points, 0.08, colors::ORBIT_PATH),
        });

        let mut effects = Vec::new();
        for effect in state.effects.iter() {
            for prim in effect.live_primitives().filter(|p| p.visible && p.opacity > 0.0) {
                let center = rotation * prim.position;
                let normal = rotation * prim.normal;
                let color = rgba(prim.color, prim.opacity);
                // Lift flat decals just off the surface
                let lifted = center + normal * 0.02;
                let vertices = match prim.shape {
                    PrimitiveShape::Disc => shapes::disc(lifted, normal, prim.scale, color, self.segments),
                    PrimitiveShape::Ring { inner_ratio } => shapes::ring(
                        lifted,
                        normal,
                        prim.scale * inner_ratio,
                        prim.scale,
                        color,
                        self.segments,
                    ),
                    PrimitiveShape::Sphere => shapes::sphere(center, prim.scale, color, 2),
                    PrimitiveShape::Hump => shapes::hump(center, normal, prim.scale, color),
                };
                effects.push(DrawBatch {
                    resource: prim.resource,
                    vertices,
                });
            }
        }

        FrameGeometry {
            surface,
            projectile,
            orbit_path,
            effects,
        }
    }
}

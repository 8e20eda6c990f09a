//! Crater carving on the primary's surface mesh

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::mesh::SurfaceMesh;

/// Dark orange burn at the crater floor
pub const SCORCH_COLOR: Vec3 = Vec3::new(0.8, 0.3, 0.0);

/// What a single `carve` call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CarveReport {
    /// Vertices inside the crater radius
    pub vertices_moved: usize,
    /// Largest inward displacement applied this call
    pub max_displacement: f32,
}

/// Displaces mesh vertices inward around an impact point
#[derive(Debug, Clone, Copy)]
pub struct SurfaceDeformer {
    pub scorch_color: Vec3,
}

impl Default for SurfaceDeformer {
    fn default() -> Self {
        Self {
            scorch_color: SCORCH_COLOR,
        }
    }
}

impl SurfaceDeformer {
    /// Carve a crater centered at `local_point`.
    ///
    /// Every vertex closer than `crater_radius` moves inward along its own
    /// radial direction by `crater_depth * falloff`, `falloff = 1 - d / crater_radius`,
    /// and its color is mixed toward the scorch color by the same factor.
    /// Calls compound: carving the same spot twice deepens the crater.
    pub fn carve(
        &self,
        mesh: &mut SurfaceMesh,
        local_point: Vec3,
        crater_radius: f32,
        crater_depth: f32,
    ) -> CarveReport {
        let mut report = CarveReport::default();
        if crater_radius <= 0.0 || crater_depth <= 0.0 {
            return report;
        }

        if mesh.is_indexed() {
            log::debug!("Expanding indexed surface mesh before carving");
            mesh.to_non_indexed();
        }

        for (pos, color) in mesh.positions.iter_mut().zip(mesh.colors.iter_mut()) {
            let dist = pos.distance(local_point);
            if dist >= crater_radius {
                continue;
            }

            let falloff = 1.0 - dist / crater_radius;
            let displacement = crater_depth * falloff;
            let inward = -pos.normalize_or_zero();
            *pos += inward * displacement;
            *color = color.lerp(self.scorch_color, falloff);

            report.vertices_moved += 1;
            report.max_displacement = report.max_displacement.max(displacement);
        }

        if report.vertices_moved > 0 {
            mesh.recompute_normals();
        }
        report
    }
}

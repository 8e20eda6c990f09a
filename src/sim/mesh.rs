//! Deformable triangulated sphere
//!
//! Generated as an indexed icosphere; cratering needs one vertex per
//! triangle corner, so callers expand it with [`SurfaceMesh::to_non_indexed`]
//! before deforming.

use std::collections::HashMap;

use glam::Vec3;

/// Untinted surface color (the texture shows through)
pub const BASE_COLOR: Vec3 = Vec3::ONE;

/// Triangle mesh with per-vertex position, normal and color (local frame)
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    /// Triangle indices; `None` once expanded to unique corners
    pub indices: Option<Vec<u32>>,
}

impl SurfaceMesh {
    /// Icosphere of the given radius.
    ///
    /// Subdivision 4 yields 5120 triangles, subdivision 5 yields 20480.
    pub fn icosphere(radius: f32, subdivisions: u32) -> Self {
        let t = (1.0 + 5.0_f32.sqrt()) / 2.0;

        let mut positions: Vec<Vec3> = [
            Vec3::new(-1.0, t, 0.0),
            Vec3::new(1.0, t, 0.0),
            Vec3::new(-1.0, -t, 0.0),
            Vec3::new(1.0, -t, 0.0),
            Vec3::new(0.0, -1.0, t),
            Vec3::new(0.0, 1.0, t),
            Vec3::new(0.0, -1.0, -t),
            Vec3::new(0.0, 1.0, -t),
            Vec3::new(t, 0.0, -1.0),
            Vec3::new(t, 0.0, 1.0),
            Vec3::new(-t, 0.0, -1.0),
            Vec3::new(-t, 0.0, 1.0),
        ]
        .iter()
        .map(|p| p.normalize())
        .collect();

        let mut indices: Vec<u32> = vec![
            0, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11, 1, 5, 9, 5, 11, 4, 11, 10, 2, 10, 7, 6,
            7, 1, 8, 3, 9, 4, 3, 4, 2, 3, 2, 6, 3, 6, 8, 3, 8, 9, 4, 9, 5, 2, 4, 11, 6, 2, 10, 8, 6,
            7, 9, 8, 1,
        ];

        for _ in 0..subdivisions {
            subdivide(&mut positions, &mut indices);
        }

        let normals = positions.clone();
        let positions: Vec<Vec3> = positions.into_iter().map(|p| p * radius).collect();
        let colors = vec![BASE_COLOR; positions.len()];

        Self {
            positions,
            normals,
            colors,
            indices: Some(indices),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    /// Vertex indices of each triangle
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        match &self.indices {
            Some(indices) => indices
                .chunks_exact(3)
                .map(|tri| [tri[0] as usize, tri[1] as usize, tri[2] as usize])
                .collect(),
            None => (0..self.positions.len() / 3)
                .map(|i| [i * 3, i * 3 + 1, i * 3 + 2])
                .collect(),
        }
    }

    /// Expand shared vertices so every triangle corner owns its vertex.
    ///
    /// No-op if the mesh is already non-indexed.
    pub fn to_non_indexed(&mut self) {
        let Some(indices) = self.indices.take() else {
            return;
        };

        let mut positions = Vec::with_capacity(indices.len());
        let mut normals = Vec::with_capacity(indices.len());
        let mut colors = Vec::with_capacity(indices.len());
        for &i in &indices {
            let i = i as usize;
            positions.push(self.positions[i]);
            normals.push(self.normals[i]);
            colors.push(self.colors[i]);
        }

        self.positions = positions;
        self.normals = normals;
        self.colors = colors;
    }

    /// Recompute vertex normals from the current positions.
    ///
    /// Face normals are accumulated area-weighted into each corner, so an
    /// indexed mesh shades smoothly and a non-indexed one shades flat.
    pub fn recompute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for [a, b, c] in self.triangles() {
            let face =
                (self.positions[b] - self.positions[a]).cross(self.positions[c] - self.positions[a]);
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        }

        for (normal, (sum, pos)) in self
            .normals
            .iter_mut()
            .zip(accum.into_iter().zip(&self.positions))
        {
            // Degenerate triangles fall back to the radial direction
            *normal = sum.try_normalize().unwrap_or_else(|| pos.normalize_or_zero());
        }
    }
}

/// Subdivide each triangle into 4 by splitting edges at midpoints (on the unit sphere).
fn subdivide(positions: &mut Vec<Vec3>, indices: &mut Vec<u32>) {
    let mut midpoint_cache: HashMap<(u32, u32), u32> = HashMap::new();
    let mut new_indices = Vec::with_capacity(indices.len() * 4);

    let mut midpoint = |a: u32, b: u32, pos: &mut Vec<Vec3>| -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&idx) = midpoint_cache.get(&key) {
            return idx;
        }
        let mid = (pos[a as usize] + pos[b as usize]).normalize();
        let idx = pos.len() as u32;
        pos.push(mid);
        midpoint_cache.insert(key, idx);
        idx
    };

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0], tri[1], tri[2]);
        let ab = midpoint(a, b, positions);
        let bc = midpoint(b, c, positions);
        let ca = midpoint(c, a, positions);

        new_indices.extend_from_slice(&[a, ab, ca]);
        new_indices.extend_from_slice(&[b, bc, ab]);
        new_indices.extend_from_slice(&[c, ca, bc]);
        new_indices.extend_from_slice(&[ab, bc, ca]);
    }

    *indices = new_indices;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icosphere_vertices_on_sphere() {
        let mesh = SurfaceMesh::icosphere(15.0, 3);
        for pos in &mesh.positions {
            assert!((pos.length() - 15.0).abs() < 1e-3, "vertex off sphere: {}", pos.length());
        }
        assert_eq!(mesh.triangle_count(), 20 * 4usize.pow(3));
    }

    #[test]
    fn test_non_indexed_expansion() {
        let mut mesh = SurfaceMesh::icosphere(1.0, 2);
        let triangles = mesh.triangle_count();
        assert!(mesh.is_indexed());

        mesh.to_non_indexed();
        assert!(!mesh.is_indexed());
        assert_eq!(mesh.vertex_count(), triangles * 3);
        assert_eq!(mesh.triangle_count(), triangles);
        assert_eq!(mesh.colors.len(), mesh.vertex_count());

        // Second call changes nothing
        mesh.to_non_indexed();
        assert_eq!(mesh.vertex_count(), triangles * 3);
    }

    #[test]
    fn test_recomputed_normals_point_outward() {
        let mut mesh = SurfaceMesh::icosphere(10.0, 2);
        mesh.to_non_indexed();
        mesh.recompute_normals();
        for (n, p) in mesh.normals.iter().zip(&mesh.positions) {
            assert!((n.length() - 1.0).abs() < 1e-4);
            assert!(n.dot(p.normalize()) > 0.9, "normal not outward");
        }
    }
}

//! Shape generation for 3D primitives
//!
//! Everything is emitted as a plain triangle list.

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::f32::consts::TAU;

use super::vertex::Vertex;
use crate::sim::mesh::SurfaceMesh;
use crate::tangent_basis;

/// Point on a circle of `radius` around `center` in the plane facing `normal`
fn circle_point(center: Vec3, t1: Vec3, t2: Vec3, radius: f32, theta: f32) -> Vec3 {
    center + (t1 * theta.cos() + t2 * theta.sin()) * radius
}

/// Filled circle facing along `normal`
pub fn disc(center: Vec3, normal: Vec3, radius: f32, color: [f32; 4], segments: u32) -> Vec<Vertex> {
    let (t1, t2) = tangent_basis(normal);
    let n = normal.normalize_or_zero();
    let mut vertices = Vec::with_capacity((segments * 3) as usize);

    for i in 0..segments {
        let theta1 = i as f32 / segments as f32 * TAU;
        let theta2 = (i + 1) as f32 / segments as f32 * TAU;

        // Triangle from center to edge
        vertices.push(Vertex::new(center, n, color));
        vertices.push(Vertex::new(circle_point(center, t1, t2, radius, theta1), n, color));
        vertices.push(Vertex::new(circle_point(center, t1, t2, radius, theta2), n, color));
    }

    vertices
}

/// Flat annulus facing along `normal`
pub fn ring(
    center: Vec3,
    normal: Vec3,
    inner_radius: f32,
    outer_radius: f32,
    color: [f32; 4],
    segments: u32,
) -> Vec<Vertex> {
    let (t1, t2) = tangent_basis(normal);
    let n = normal.normalize_or_zero();
    let mut vertices = Vec::with_capacity((segments * 6) as usize);

    for i in 0..segments {
        let theta1 = i as f32 / segments as f32 * TAU;
        let theta2 = (i + 1) as f32 / segments as f32 * TAU;

        let inner1 = circle_point(center, t1, t2, inner_radius, theta1);
        let outer1 = circle_point(center, t1, t2, outer_radius, theta1);
        let inner2 = circle_point(center, t1, t2, inner_radius, theta2);
        let outer2 = circle_point(center, t1, t2, outer_radius, theta2);

        // Two triangles per segment
        vertices.push(Vertex::new(inner1, n, color));
        vertices.push(Vertex::new(outer1, n, color));
        vertices.push(Vertex::new(inner2, n, color));

        vertices.push(Vertex::new(inner2, n, color));
        vertices.push(Vertex::new(outer1, n, color));
        vertices.push(Vertex::new(outer2, n, color));
    }

    vertices
}

/// Triangles of `mesh`, rotated then translated
pub fn mesh_vertices(mesh: &SurfaceMesh, rotation: Quat, offset: Vec3, tint: [f32; 4]) -> Vec<Vertex> {
    mesh.triangles()
        .into_iter()
        .flatten()
        .map(|i| {
            let c = mesh.colors[i];
            Vertex::new(
                rotation * mesh.positions[i] + offset,
                rotation * mesh.normals[i],
                [c.x * tint[0], c.y * tint[1], c.z * tint[2], tint[3]],
            )
        })
        .collect()
}

/// Solid sphere
pub fn sphere(center: Vec3, radius: f32, color: [f32; 4], subdivisions: u32) -> Vec<Vertex> {
    mesh_vertices(&SurfaceMesh::icosphere(radius, subdivisions), Quat::IDENTITY, center, color)
}

/// Sphere squashed along `normal`: a low mound sitting on the surface
pub fn hump(center: Vec3, normal: Vec3, size: f32, color: [f32; 4]) -> Vec<Vertex> {
    let n = normal.normalize_or_zero();
    let mut vertices = sphere(Vec3::ZERO, size, color, 1);
    for v in &mut vertices {
        let p = Vec3::from_array(v.position);
        let flattened = p - n * p.dot(n) * 0.5;
        v.position = (center + flattened).to_array();
    }
    vertices
}

/// Ribbon along `points`, `width` wide, lying across the radial direction
pub fn polyline(points: &[Vec3], width: f32, color: [f32; 4]) -> Vec<Vertex> {
    if points.len() < 2 {
        return Vec::new();
    }

    let mut vertices = Vec::with_capacity((points.len() - 1) * 6);
    for pair in points.windows(2) {
        let (p1, p2) = (pair[0], pair[1]);
        let dir = (p2 - p1).normalize_or_zero();
        let up = p1.normalize_or_zero();
        let side = dir.cross(up).try_normalize().unwrap_or(Vec3::X) * (width * 0.5);

        // Two triangles per segment
        vertices.push(Vertex::new(p1 + side, up, color));
        vertices.push(Vertex::new(p1 - side, up, color));
        vertices.push(Vertex::new(p2 + side, up, color));

        vertices.push(Vertex::new(p2 + side, up, color));
        vertices.push(Vertex::new(p1 - side, up, color));
        vertices.push(Vertex::new(p2 - side, up, color));
    }

    vertices
}

/// Lumpy rock: an icosphere with every vertex pushed in or out at random.
///
/// Shared vertices move together, so the surface stays closed.
pub fn asteroid(seed: u64, radius: f32, bumpiness: f32, color: Vec3, subdivisions: u32) -> SurfaceMesh {
    let mut rng = Pcg32::seed_from_u64(seed);
    let mut mesh = SurfaceMesh::icosphere(radius, subdivisions);
    for p in &mut mesh.positions {
        let noise = (rng.random::<f32>() - 0.5) * bumpiness;
        *p *= 1.0 + noise;
    }
    mesh.colors.fill(color);
    mesh.recompute_normals();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disc_lies_in_plane() {
        let verts = disc(Vec3::new(0.0, 0.0, 15.0), Vec3::Z, 2.0, [1.0; 4], 16);
        assert_eq!(verts.len(), 48);
        for v in &verts {
            assert!((v.position[2] - 15.0).abs() < 1e-5);
            let r = Vec3::from_array(v.position).truncate().length();
            assert!(r <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn test_ring_has_hole() {
        let verts = ring(Vec3::ZERO, Vec3::Y, 1.0, 2.0, [1.0; 4], 12);
        assert_eq!(verts.len(), 72);
        for v in &verts {
            let r = Vec3::from_array(v.position).length();
            assert!(r >= 1.0 - 1e-4 && r <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn test_asteroid_is_deterministic_and_bumpy() {
        let a = asteroid(9, 1.0, 0.4, Vec3::splat(0.5), 2);
        let b = asteroid(9, 1.0, 0.4, Vec3::splat(0.5), 2);
        assert_eq!(a.positions, b.positions);

        let radii: Vec<f32> = a.positions.iter().map(|p| p.length()).collect();
        let min = radii.iter().copied().fold(f32::MAX, f32::min);
        let max = radii.iter().copied().fold(f32::MIN, f32::max);
        assert!(max - min > 0.05);
        assert!(min >= 0.8 - 1e-4 && max <= 1.2 + 1e-4);
    }

    #[test]
    fn test_polyline_segments() {
        let points = [Vec3::new(20.0, 0.0, 0.0), Vec3::new(19.0, 1.0, 0.0), Vec3::new(18.0, 2.0, 0.0)];
        assert_eq!(polyline(&points, 0.1, [1.0; 4]).len(), 12);
        assert!(polyline(&points[..1], 0.1, [1.0; 4]).is_empty());
    }
}

//! Vertex types for lit 3D rendering

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Position, normal and RGBA color
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, color: [f32; 4]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// RGBA with the given opacity
#[inline]
pub fn rgba(color: Vec3, alpha: f32) -> [f32; 4] {
    [color.x, color.y, color.z, alpha]
}

/// Colors for scene elements
pub mod colors {
    /// Surface tint when no texture is loaded
    pub const SURFACE: [f32; 4] = [0.25, 0.45, 0.7, 1.0];
    pub const ORBIT_PATH: [f32; 4] = [1.0, 1.0, 1.0, 0.35];
}

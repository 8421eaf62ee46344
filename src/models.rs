// src/models.rs
use bytemuck::{Pod, Zeroable};

// --- Vertex Data for Lines (tessellated strokes) ---
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 2], // pixel coordinates, origin top-left
    pub color: [f32; 4],    // RGBA (linear space, alpha already includes layer opacity)
}

impl LineVertex {
    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

// Uniform sent to the line shader; pixel -> NDC mapping happens on the GPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ViewportUniform {
    pub size: [f32; 2],
    pub needs_srgb_output_conversion: u32, // 0 for false, 1 for true
    pub _padding: u32,
}

impl ViewportUniform {
    pub fn new(width: u32, height: u32, needs_srgb_output_conversion: bool) -> Self {
        Self {
            size: [width.max(1) as f32, height.max(1) as f32],
            needs_srgb_output_conversion: needs_srgb_output_conversion as u32,
            _padding: 0,
        }
    }
}

// Draw systems
//
// Everything recorded between begin_render_pass and end_render_pass goes
// through a DrawSystem. The application calls them in order each frame.

pub mod rect_system;

pub use rect_system::RectDrawSystem;

use ash::vk;

use crate::camera::Camera;
use crate::scene::ObjectRegistry;

/// Per-frame data handed to every draw system
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo<'a> {
    /// Frame-in-flight slot; index per-slot resources with this
    pub frame_index: usize,
    /// Seconds since the previous frame
    pub frame_time: f32,
    pub command_buffer: vk::CommandBuffer,
    pub extent: vk::Extent2D,
    pub camera: &'a Camera,
    pub objects: &'a ObjectRegistry,
}

pub trait DrawSystem {
    /// Record this system's commands into `frame.command_buffer`. The
    /// swapchain render pass is open.
    fn draw(&mut self, frame: &FrameInfo);
}

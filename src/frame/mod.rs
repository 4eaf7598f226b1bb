// Frame orchestration core
//
// The renderer drives acquire -> record -> submit -> present through the
// traits below. The Vulkan backend implements them for real hardware; the
// integration tests implement them with recording doubles.

pub mod hazard;
pub mod renderer;
pub mod selection;
pub mod session;

pub use hazard::ImageHazardGuard;
pub use renderer::Renderer;
pub use session::FrameSession;

use ash::vk;

use crate::error::Result;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Result of asking the swapchain for the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image is ready to be rendered into
    Ready(u32),
    /// Image is usable, but the swapchain no longer matches the surface exactly
    Suboptimal(u32),
    /// Swapchain is stale; nothing may be drawn until it is recreated
    OutOfDate,
}

/// Result of submitting and presenting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

impl PresentStatus {
    pub fn needs_recreate(self) -> bool {
        !matches!(self, PresentStatus::Optimal)
    }
}

/// Attachment formats a render pass (and every pipeline built on it) depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainFormats {
    pub color: vk::Format,
    pub depth: vk::Format,
}

/// Everything needed to open the swapchain render pass on a command buffer
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
}

impl RenderPassBegin {
    /// Clear values in attachment order (color, depth)
    pub fn clear_values(&self) -> [vk::ClearValue; 2] {
        [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.clear_depth,
                    stencil: self.clear_stencil,
                },
            },
        ]
    }
}

/// The window (or anything else) that yields a drawable area
pub trait PresentationSurface {
    /// Current drawable size in pixels. Zero while minimized.
    fn extent(&self) -> vk::Extent2D;

    fn was_resized(&self) -> bool;

    fn reset_resized_flag(&mut self);

    /// Block until the windowing system may have a new extent to report.
    ///
    /// The renderer re-reads `extent` after every call and keeps waiting
    /// while it is zero, so `extent` must reflect live window state for the
    /// wait to end.
    fn wait_events(&mut self);
}

/// CPU-side fence operations used by the per-image hazard guard
pub trait FenceOps {
    fn wait_for_fence(&self, fence: vk::Fence) -> Result<()>;
    fn reset_fence(&self, fence: vk::Fence) -> Result<()>;
}

/// Presentable images plus the render pass and framebuffers that target them
pub trait SwapchainTarget {
    fn image_count(&self) -> usize;

    fn extent(&self) -> vk::Extent2D;

    fn formats(&self) -> SwapchainFormats;

    fn render_pass(&self) -> vk::RenderPass;

    fn framebuffer(&self, image_index: u32) -> vk::Framebuffer;

    /// Wait for `slot` to be reusable, then acquire the next image,
    /// signaling the slot's "image available" semaphore.
    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Submit `command_buffers` for `image_index` using `slot`'s
    /// synchronization objects, then present the image.
    fn submit_command_buffers(
        &mut self,
        command_buffers: &[vk::CommandBuffer],
        image_index: u32,
        slot: usize,
    ) -> Result<PresentStatus>;
}

/// The device-side collaborator: swapchain factory, command buffers, recording
pub trait GraphicsContext {
    type Swapchain: SwapchainTarget;

    /// Build a swapchain for `window_extent`. `previous` is the swapchain being
    /// replaced, if any; it stays alive until the new one exists.
    fn create_swapchain(
        &self,
        window_extent: vk::Extent2D,
        previous: Option<&Self::Swapchain>,
    ) -> Result<Self::Swapchain>;

    fn wait_idle(&self) -> Result<()>;

    fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>>;

    fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]);

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()>;

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()>;

    /// Open the render pass and set the dynamic viewport and scissor.
    fn cmd_begin_render_pass(&self, command_buffer: vk::CommandBuffer, begin: &RenderPassBegin);

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);
}

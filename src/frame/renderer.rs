// Frame orchestrator
//
// Owns the swapchain and one primary command buffer per frame in flight, and
// hides swapchain recreation behind begin_frame/end_frame. Callers only ever
// see "no frame this tick" (begin_frame returning None) when the surface went
// stale; everything else that goes wrong is a FrameError.
//
// FRAME FLOW:
// 1. begin_frame        acquire image, begin command buffer
// 2. begin_render_pass  clear, viewport, scissor
// 3. draw systems       caller-ordered (UI last)
// 4. end_render_pass
// 5. end_frame          submit, present, recreate if asked, next slot

use ash::vk;

use super::{
    AcquireOutcome, FrameSession, GraphicsContext, PresentationSurface, RenderPassBegin,
    SwapchainTarget, MAX_FRAMES_IN_FLIGHT,
};
use crate::error::{FrameError, Result};

/// Near-black clear color used unless the caller configures another one
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.01, 0.01, 0.01, 1.0];

/// Frame orchestrator.
///
/// IMPORTANT: Field order matters for Drop! The swapchain must be destroyed
/// before the context that created it.
pub struct Renderer<C: GraphicsContext, S: PresentationSurface> {
    swapchain: C::Swapchain,
    /// One primary command buffer per frame-in-flight slot
    command_buffers: Vec<vk::CommandBuffer>,
    session: FrameSession,
    clear_color: [f32; 4],
    /// Set when acquire reported a suboptimal swapchain; honored in end_frame
    recreate_requested: bool,
    recreation_count: u64,
    surface: S,
    context: C,
}

impl<C: GraphicsContext, S: PresentationSurface> Renderer<C, S> {
    pub fn new(context: C, mut surface: S) -> Result<Self> {
        let extent = wait_for_drawable_extent(&mut surface);
        let swapchain = context.create_swapchain(extent, None)?;
        let command_buffers = context.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;

        log::info!(
            "Renderer ready: {}x{}, {} swapchain images, {} frames in flight",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            swapchain,
            command_buffers,
            session: FrameSession::new(),
            clear_color: DEFAULT_CLEAR_COLOR,
            recreate_requested: false,
            recreation_count: 0,
            surface,
            context,
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Render pass every draw-system pipeline must be compatible with
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.swapchain.extent();
        extent.width as f32 / extent.height as f32
    }

    pub fn swapchain(&self) -> &C::Swapchain {
        &self.swapchain
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.session.is_recording()
    }

    /// Number of swapchain recreations since construction
    pub fn recreation_count(&self) -> u64 {
        self.recreation_count
    }

    pub fn frames_completed(&self) -> u64 {
        self.session.frames_completed()
    }

    /// Frame-in-flight slot of the open frame
    pub fn frame_index(&self) -> usize {
        assert!(
            self.session.is_recording(),
            "Can't get the frame index when no frame is in progress"
        );
        self.session.slot()
    }

    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        assert!(
            self.session.is_recording(),
            "Can't get the command buffer when no frame is in progress"
        );
        self.command_buffers[self.session.slot()]
    }

    // =========================================================================
    // FRAME LIFECYCLE
    // =========================================================================

    /// Start a frame.
    ///
    /// Returns `None` when the swapchain was stale: it has been recreated and
    /// nothing may be recorded this tick.
    pub fn begin_frame(&mut self) -> Result<Option<vk::CommandBuffer>> {
        assert!(
            !self.session.is_recording(),
            "Can't call begin_frame while a frame is in progress"
        );

        let slot = self.session.slot();
        let image_index = match self.swapchain.acquire_next_image(slot)? {
            AcquireOutcome::Ready(image_index) => image_index,
            AcquireOutcome::Suboptimal(image_index) => {
                log::debug!("Swapchain suboptimal on acquire, recreating after this frame");
                self.recreate_requested = true;
                image_index
            }
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire, skipping frame");
                self.recreate_swapchain()?;
                return Ok(None);
            }
        };

        let command_buffer = self.command_buffers[slot];
        self.context.begin_command_buffer(command_buffer)?;
        self.session.begin(image_index);

        Ok(Some(command_buffer))
    }

    /// Open the swapchain render pass: clear color and depth, full-extent
    /// viewport (depth range [0, 1]) and scissor.
    pub fn begin_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(
            self.session.is_recording(),
            "Can't begin the render pass when no frame is in progress"
        );
        assert_eq!(
            command_buffer,
            self.current_command_buffer(),
            "Can't begin the render pass on a command buffer from a different frame"
        );

        let image_index = self.session.image_index().unwrap_or_default();
        let extent = self.swapchain.extent();
        let begin = RenderPassBegin {
            render_pass: self.swapchain.render_pass(),
            framebuffer: self.swapchain.framebuffer(image_index),
            extent,
            clear_color: self.clear_color,
            clear_depth: 1.0,
            clear_stencil: 0,
            viewport: vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
        };

        self.context.cmd_begin_render_pass(command_buffer, &begin);
    }

    pub fn end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(
            self.session.is_recording(),
            "Can't end the render pass when no frame is in progress"
        );
        assert_eq!(
            command_buffer,
            self.current_command_buffer(),
            "Can't end the render pass on a command buffer from a different frame"
        );

        self.context.cmd_end_render_pass(command_buffer);
    }

    /// Finish recording, submit and present. Recreates the swapchain when the
    /// presentation engine or the window asks for it.
    pub fn end_frame(&mut self) -> Result<()> {
        let Some(image_index) = self.session.image_index() else {
            panic!("Can't call end_frame when no frame is in progress");
        };
        let slot = self.session.slot();
        let command_buffer = self.command_buffers[slot];

        self.context.end_command_buffer(command_buffer)?;
        let status = self
            .swapchain
            .submit_command_buffers(&[command_buffer], image_index, slot)?;

        self.session.end();

        // Both signals can arrive in the same tick; one recreation covers both
        let resized = self.surface.was_resized();
        if status.needs_recreate() || resized || self.recreate_requested {
            log::debug!(
                "Recreating swapchain after present (status: {:?}, resized: {})",
                status,
                resized
            );
            self.recreate_swapchain()?;
        }

        Ok(())
    }

    /// Rebuild the swapchain for the surface's current extent.
    ///
    /// Blocks while the surface is zero-sized, then waits for the device to go
    /// idle. The old swapchain stays alive until its replacement exists. Any
    /// pending resize is covered by the new extent and is cleared.
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        assert!(
            !self.session.is_recording(),
            "Can't recreate the swapchain while a frame is in progress"
        );

        let extent = wait_for_drawable_extent(&mut self.surface);
        self.surface.reset_resized_flag();
        self.context.wait_idle()?;

        let swapchain = self.context.create_swapchain(extent, Some(&self.swapchain))?;

        let previous = self.swapchain.formats();
        let current = swapchain.formats();
        if previous != current {
            log::error!(
                "Swapchain formats changed on recreation: {:?} -> {:?}",
                previous,
                current
            );
            return Err(FrameError::FormatChanged { previous, current });
        }

        self.swapchain = swapchain;
        self.recreate_requested = false;
        self.recreation_count += 1;

        log::info!(
            "Swapchain recreated: {}x{} ({} images)",
            self.swapchain.extent().width,
            self.swapchain.extent().height,
            self.swapchain.image_count()
        );
        Ok(())
    }
}

impl<C: GraphicsContext, S: PresentationSurface> Drop for Renderer<C, S> {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::warn!("Device wait failed during renderer teardown: {}", e);
        }
        self.context.free_command_buffers(&self.command_buffers);
        self.command_buffers.clear();
    }
}

/// Poll the surface until it reports a drawable (non-zero) extent.
fn wait_for_drawable_extent(surface: &mut impl PresentationSurface) -> vk::Extent2D {
    let mut extent = surface.extent();
    while extent.width == 0 || extent.height == 0 {
        surface.wait_events();
        extent = surface.extent();
    }
    extent
}

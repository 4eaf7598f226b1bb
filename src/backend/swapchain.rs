// Swapchain - Window presentation
//
// Owns everything sized to the surface: presentable images and views, one
// depth attachment per image, the render pass that writes them and one
// framebuffer per image. Also owns the per-slot semaphores/fences and the
// per-image hazard guard. Never patched in place: a resize builds a new one.

use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;

use super::depth::DepthAttachment;
use super::sync::FrameSync;
use super::VulkanDevice;
use crate::error::{vk_err, FrameError, Result};
use crate::frame::selection;
use crate::frame::{
    AcquireOutcome, ImageHazardGuard, PresentStatus, SwapchainFormats, SwapchainTarget,
    MAX_FRAMES_IN_FLIGHT,
};

pub struct VulkanSwapchain {
    swapchain: vk::SwapchainKHR,
    loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth_attachments: Vec<DepthAttachment>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    formats: SwapchainFormats,
    extent: vk::Extent2D,
    frame_sync: Vec<FrameSync>,
    image_guard: ImageHazardGuard,
    device: Arc<VulkanDevice>,
}

impl VulkanSwapchain {
    /// Build a swapchain for `window_extent`.
    ///
    /// `previous` is handed to the presentation engine as `old_swapchain` so it
    /// can retire the old images cleanly; the caller destroys it afterwards.
    pub fn new(
        device: Arc<VulkanDevice>,
        window_extent: vk::Extent2D,
        previous: Option<&VulkanSwapchain>,
    ) -> Result<Self> {
        let surface = device.surface;
        let surface_loader = &device.surface_loader;

        // Query surface capabilities, formats and present modes
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(device.physical_device, surface)
        }
        .map_err(vk_err("query surface capabilities"))?;
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device, surface)
        }
        .map_err(vk_err("query surface formats"))?;
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(device.physical_device, surface)
        }
        .map_err(vk_err("query surface present modes"))?;

        let config = selection::negotiate(&capabilities, &formats, &present_modes, window_extent)?;

        log::info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images requested",
            config.extent.width,
            config.extent.height,
            config.surface_format.format,
            config.present_mode,
            config.image_count
        );

        let formats = SwapchainFormats {
            color: config.surface_format.format,
            depth: device.find_depth_format()?,
        };
        let extent = config.extent;

        let loader = ash::khr::swapchain::Device::new(&device.instance, &device.device);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(config.image_count)
            .image_format(formats.color)
            .image_color_space(config.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(previous.map_or(vk::SwapchainKHR::null(), |p| p.swapchain));

        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(vk_err("create swapchain"))?;

        // Filled in step by step; if a step fails, Drop releases what exists
        let mut this = Self {
            swapchain,
            loader,
            images: Vec::new(),
            image_views: Vec::new(),
            depth_attachments: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            formats,
            extent,
            frame_sync: Vec::new(),
            image_guard: ImageHazardGuard::new(0),
            device: device.clone(),
        };

        this.images = unsafe { this.loader.get_swapchain_images(swapchain) }
            .map_err(vk_err("get swapchain images"))?;
        let images = this.images.clone();

        log::info!("Created swapchain with {} images", images.len());

        build_each(images.len(), &mut this.image_views, |i| {
            create_color_view(&device.device, images[i], formats.color)
        })?;

        this.render_pass = create_render_pass(&device.device, formats)?;
        let render_pass = this.render_pass;

        build_each(images.len(), &mut this.depth_attachments, |_| {
            DepthAttachment::new(&device, extent, formats.depth)
        })?;

        let color_views = this.image_views.clone();
        let depth_views: Vec<vk::ImageView> =
            this.depth_attachments.iter().map(|depth| depth.view).collect();
        build_each(images.len(), &mut this.framebuffers, |i| {
            create_framebuffer(&device.device, render_pass, color_views[i], depth_views[i], extent)
        })?;

        build_each(MAX_FRAMES_IN_FLIGHT, &mut this.frame_sync, |_| {
            FrameSync::new(&device.device)
        })?;

        this.image_guard = ImageHazardGuard::new(images.len());

        Ok(this)
    }
}

impl SwapchainTarget for VulkanSwapchain {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn formats(&self) -> SwapchainFormats {
        self.formats
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let sync = &self.frame_sync[slot];

        // The slot's previous submission must be finished before its
        // semaphores and command buffer are reused
        unsafe {
            self.device
                .device
                .wait_for_fences(&[sync.in_flight_fence], true, u64::MAX)
        }
        .map_err(vk_err("wait for frame slot fence"))?;

        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };

        acquire_outcome(result)
    }

    fn submit_command_buffers(
        &mut self,
        command_buffers: &[vk::CommandBuffer],
        image_index: u32,
        slot: usize,
    ) -> Result<PresentStatus> {
        let sync = &self.frame_sync[slot];

        // Another slot may still be rendering into this image
        self.image_guard
            .claim(image_index, sync.in_flight_fence, self.device.as_ref())?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores) // Wait for image to be available
            .wait_dst_stage_mask(&wait_stages) // ...before writing color output
            .command_buffers(command_buffers)
            .signal_semaphores(&signal_semaphores); // Signal when done

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info],
                sync.in_flight_fence, // Signal this fence when GPU is done
            )
        }
        .map_err(vk_err("submit draw command buffer"))?;

        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores) // Wait for rendering to finish
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.loader
                .queue_present(self.device.graphics_queue, &present_info)
        };

        present_status(result)
    }
}

impl Drop for VulkanSwapchain {
    // Also runs on a partially built swapchain; destroying a null handle is a no-op
    fn drop(&mut self) {
        let device = &self.device.device;
        unsafe {
            for sync in &self.frame_sync {
                sync.destroy(device);
            }
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
        }
        for depth in self.depth_attachments.drain(..) {
            depth.destroy(&self.device);
        }
        unsafe {
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Create `count` objects onto the end of `out`, stopping at the first
/// failure. Whatever was created before it stays in `out` for the owner to
/// destroy.
fn build_each<T, E>(
    count: usize,
    out: &mut Vec<T>,
    mut create: impl FnMut(usize) -> std::result::Result<T, E>,
) -> std::result::Result<(), E> {
    out.reserve(count);
    for i in 0..count {
        out.push(create(i)?);
    }
    Ok(())
}

/// Classify an acquire result. Only out-of-date is recoverable among errors.
fn acquire_outcome(result: VkResult<(u32, bool)>) -> Result<AcquireOutcome> {
    match result {
        Ok((image_index, false)) => Ok(AcquireOutcome::Ready(image_index)),
        Ok((image_index, true)) => Ok(AcquireOutcome::Suboptimal(image_index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(result) => Err(FrameError::Vulkan {
            what: "acquire next swapchain image",
            result,
        }),
    }
}

/// Classify a present result. Only out-of-date is recoverable among errors.
fn present_status(result: VkResult<bool>) -> Result<PresentStatus> {
    match result {
        Ok(false) => Ok(PresentStatus::Optimal),
        Ok(true) => Ok(PresentStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
        Err(result) => Err(FrameError::Vulkan {
            what: "present swapchain image",
            result,
        }),
    }
}

fn create_color_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }
        .map_err(vk_err("create swapchain image view"))
}

/// Color is cleared and stored for presentation; depth is cleared and discarded.
fn create_render_pass(device: &ash::Device, formats: SwapchainFormats) -> Result<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::default()
        .format(formats.color)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let depth_attachment = vk::AttachmentDescription::default()
        .format(formats.depth)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let color_attachment_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let depth_attachment_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    // Single subpass shared by every draw system
    let color_attachments = [color_attachment_ref];
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments)
        .depth_stencil_attachment(&depth_attachment_ref);

    // Attachment writes wait for the previous use of the image (and the
    // acquire semaphore, which is gated at color output)
    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

    let attachments = [color_attachment, depth_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&render_pass_info, None) }
        .map_err(vk_err("create render pass"))
}

fn create_framebuffer(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    color_view: vk::ImageView,
    depth_view: vk::ImageView,
    extent: vk::Extent2D,
) -> Result<vk::Framebuffer> {
    let attachments = [color_view, depth_view];
    let framebuffer_info = vk::FramebufferCreateInfo::default()
        .render_pass(render_pass)
        .attachments(&attachments)
        .width(extent.width)
        .height(extent.height)
        .layers(1);

    unsafe { device.create_framebuffer(&framebuffer_info, None) }
        .map_err(vk_err("create framebuffer"))
}

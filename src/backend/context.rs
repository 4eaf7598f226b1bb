// Vulkan graphics context
//
// Binds the device to the renderer: builds swapchains for the device's
// surface and owns the command pool the per-slot command buffers come from.

use ash::vk;
use std::sync::Arc;

use super::{VulkanDevice, VulkanSwapchain};
use crate::error::{vk_err, Result};
use crate::frame::{GraphicsContext, RenderPassBegin};

pub struct VulkanContext {
    command_pool: vk::CommandPool,
    device: Arc<VulkanDevice>,
}

impl VulkanContext {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.graphics_queue_family)
            // Command buffers are re-recorded every time their slot comes around
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .map_err(vk_err("create command pool"))?;

        Ok(Self {
            command_pool,
            device,
        })
    }
}

impl GraphicsContext for VulkanContext {
    type Swapchain = VulkanSwapchain;

    fn create_swapchain(
        &self,
        window_extent: vk::Extent2D,
        previous: Option<&VulkanSwapchain>,
    ) -> Result<VulkanSwapchain> {
        VulkanSwapchain::new(self.device.clone(), window_extent, previous)
    }

    fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.device.allocate_command_buffers(&alloc_info) }
            .map_err(vk_err("allocate command buffers"))
    }

    fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device
                .device
                .free_command_buffers(self.command_pool, command_buffers);
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        // Implicitly resets the buffer (pool has RESET_COMMAND_BUFFER)
        unsafe {
            self.device
                .device
                .begin_command_buffer(command_buffer, &begin_info)
        }
        .map_err(vk_err("begin recording command buffer"))
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        unsafe { self.device.device.end_command_buffer(command_buffer) }
            .map_err(vk_err("record command buffer"))
    }

    fn cmd_begin_render_pass(&self, command_buffer: vk::CommandBuffer, begin: &RenderPassBegin) {
        let clear_values = begin.clear_values();
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: begin.extent,
            })
            .clear_values(&clear_values);

        let device = &self.device.device;
        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            device.cmd_set_viewport(command_buffer, 0, &[begin.viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[begin.scissor]);
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.device.device.cmd_end_render_pass(command_buffer) };
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        // Also frees any command buffers still allocated from the pool
        unsafe {
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
        }
    }
}

// Depth attachments
//
// One depth image per swapchain image, sized to the swapchain extent and
// backed by gpu-allocator memory.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use super::VulkanDevice;
use crate::error::{vk_err, Result};

pub struct DepthAttachment {
    pub image: vk::Image,
    pub view: vk::ImageView,
    allocation: Allocation,
}

impl DepthAttachment {
    pub fn new(device: &VulkanDevice, extent: vk::Extent2D, format: vk::Format) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { device.device.create_image(&image_info, None) }
            .map_err(vk_err("create depth image"))?;

        let requirements = unsafe { device.device.get_image_memory_requirements(image) };
        let allocation = device.allocator().allocate(&AllocationCreateDesc {
            name: "swapchain depth",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.device.destroy_image(image, None) };
                return Err(e.into());
            }
        };

        let mut attachment = Self {
            image,
            view: vk::ImageView::null(),
            allocation,
        };
        match attachment.bind_and_create_view(device, format) {
            Ok(view) => {
                attachment.view = view;
                Ok(attachment)
            }
            Err(e) => {
                attachment.destroy(device);
                Err(e)
            }
        }
    }

    fn bind_and_create_view(&self, device: &VulkanDevice, format: vk::Format) -> Result<vk::ImageView> {
        unsafe {
            device
                .device
                .bind_image_memory(self.image, self.allocation.memory(), self.allocation.offset())
                .map_err(vk_err("bind depth image memory"))?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::DEPTH,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { device.device.create_image_view(&view_info, None) }
            .map_err(vk_err("create depth image view"))
    }

    pub fn destroy(self, device: &VulkanDevice) {
        unsafe {
            device.device.destroy_image_view(self.view, None);
            device.device.destroy_image(self.image, None);
        }
        if let Err(e) = device.allocator().free(self.allocation) {
            log::warn!("Failed to free depth image memory: {}", e);
        }
    }
}

// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync
// One FrameSync per frame in flight, indexed by the renderer's slot

use ash::vk;

use crate::error::{vk_err, Result};

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    /// Signaled by acquire, waited on by the submission (color output stage)
    pub image_available: vk::Semaphore,
    /// Signaled by the submission, waited on by present
    pub render_finished: vk::Semaphore,
    /// Signaled when the slot's submission completes
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let mut sync = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight_fence: vk::Fence::null(),
        };
        // Destroying the null handles left by a failed step is a no-op
        match sync.create_objects(device) {
            Ok(()) => Ok(sync),
            Err(e) => {
                sync.destroy(device);
                Err(e)
            }
        }
    }

    fn create_objects(&mut self, device: &ash::Device) -> Result<()> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        unsafe {
            self.image_available = device
                .create_semaphore(&semaphore_info, None)
                .map_err(vk_err("create image-available semaphore"))?;
            self.render_finished = device
                .create_semaphore(&semaphore_info, None)
                .map_err(vk_err("create render-finished semaphore"))?;
            self.in_flight_fence = device
                .create_fence(&fence_info, None)
                .map_err(vk_err("create in-flight fence"))?;
        }
        Ok(())
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

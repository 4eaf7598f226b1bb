// Per-image hazard guard
//
// Frame slots rotate independently of swapchain images, so the image handed
// out by acquire may still be in use by a submission from another slot. Each
// image remembers the fence of the last slot that wrote it; a new writer waits
// on that fence first.

use ash::vk;

use super::FenceOps;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ImageHazardGuard {
    /// `None` until a frame slot first writes the image
    in_flight: Vec<Option<vk::Fence>>,
}

impl ImageHazardGuard {
    pub fn new(image_count: usize) -> Self {
        Self {
            in_flight: vec![None; image_count],
        }
    }

    pub fn image_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Fence of the slot that last wrote `image_index`, if any.
    pub fn owner(&self, image_index: u32) -> Option<vk::Fence> {
        self.in_flight[image_index as usize]
    }

    /// Hand `image_index` to the slot guarded by `slot_fence`.
    ///
    /// Waits for the previous writer (if any), records the new owner and
    /// resets `slot_fence` so the upcoming submission can signal it.
    pub fn claim(
        &mut self,
        image_index: u32,
        slot_fence: vk::Fence,
        fences: &impl FenceOps,
    ) -> Result<()> {
        let entry = &mut self.in_flight[image_index as usize];
        if let Some(previous) = *entry {
            fences.wait_for_fence(previous)?;
        }
        *entry = Some(slot_fence);
        fences.reset_fence(slot_fence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::cell::RefCell;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(u64),
        Reset(u64),
    }

    #[derive(Default)]
    struct RecordingFences {
        calls: RefCell<Vec<Call>>,
    }

    impl FenceOps for RecordingFences {
        fn wait_for_fence(&self, fence: vk::Fence) -> Result<()> {
            self.calls.borrow_mut().push(Call::Wait(fence.as_raw()));
            Ok(())
        }

        fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
            self.calls.borrow_mut().push(Call::Reset(fence.as_raw()));
            Ok(())
        }
    }

    fn fence(raw: u64) -> vk::Fence {
        vk::Fence::from_raw(raw)
    }

    #[test]
    fn untouched_images_have_no_owner() {
        let guard = ImageHazardGuard::new(3);
        assert_eq!(guard.image_count(), 3);
        assert!((0..3).all(|i| guard.owner(i).is_none()));
    }

    #[test]
    fn first_claim_only_resets() {
        let fences = RecordingFences::default();
        let mut guard = ImageHazardGuard::new(2);

        guard.claim(1, fence(10), &fences).unwrap();

        assert_eq!(*fences.calls.borrow(), vec![Call::Reset(10)]);
        assert_eq!(guard.owner(1), Some(fence(10)));
        assert_eq!(guard.owner(0), None);
    }

    #[test]
    fn claimed_image_waits_for_previous_writer_then_resets() {
        let fences = RecordingFences::default();
        let mut guard = ImageHazardGuard::new(3);

        guard.claim(0, fence(10), &fences).unwrap();
        guard.claim(0, fence(20), &fences).unwrap();

        assert_eq!(
            *fences.calls.borrow(),
            vec![Call::Reset(10), Call::Wait(10), Call::Reset(20)]
        );
        assert_eq!(guard.owner(0), Some(fence(20)));
    }

    #[test]
    fn images_are_tracked_independently() {
        let fences = RecordingFences::default();
        let mut guard = ImageHazardGuard::new(3);

        guard.claim(0, fence(10), &fences).unwrap();
        guard.claim(1, fence(20), &fences).unwrap();
        guard.claim(2, fence(10), &fences).unwrap();

        // no image was written twice, so nothing had to wait
        assert!(fences
            .calls
            .borrow()
            .iter()
            .all(|call| matches!(call, Call::Reset(_))));
    }
}

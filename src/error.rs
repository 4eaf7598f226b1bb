// Error types for frame orchestration
//
// Recoverable surface signals (out-of-date, suboptimal) never show up here:
// the renderer absorbs them. Everything in this enum ends the frame loop.

use ash::vk;
use thiserror::Error;

use crate::frame::SwapchainFormats;

/// Fatal renderer errors
#[derive(Debug, Error)]
pub enum FrameError {
    /// A Vulkan call returned an error code outside the recoverable set
    #[error("failed to {what}: {result:?}")]
    Vulkan {
        what: &'static str,
        result: vk::Result,
    },

    /// Recreation produced attachments incompatible with the existing render pass
    #[error("swapchain format changed on recreation ({previous:?} -> {current:?})")]
    FormatChanged {
        previous: SwapchainFormats,
        current: SwapchainFormats,
    },

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("no supported depth format among {0:?}")]
    NoDepthFormat(Vec<vk::Format>),

    #[error("GPU memory allocation failed: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// `map_err` adapter for raw `ash` results.
pub fn vk_err(what: &'static str) -> impl FnOnce(vk::Result) -> FrameError {
    move |result| FrameError::Vulkan { what, result }
}

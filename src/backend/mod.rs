// Backend module - Vulkan implementation of the frame traits
//
// Design: Thin wrapper around ash; the frame core never sees raw handles
// beyond what its traits pass through

pub mod context;
pub mod depth;
pub mod device;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use context::VulkanContext;
pub use device::VulkanDevice;
pub use surface::WindowSurface;
pub use swapchain::VulkanSwapchain;

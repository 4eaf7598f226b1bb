// =============================================================================
// WIND RENDERER - Vulkan frame orchestration
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App (winit event loop, config, scene)                          │
// │    └── Renderer (frame state machine, slot rotation)            │
// │          └── VulkanContext + VulkanSwapchain                    │
// │                └── Per-slot command buffers + sync objects      │
// │                      └── Per-image hazard guard                 │
// └─────────────────────────────────────────────────────────────────┘
//
// frame/ is GPU-agnostic and talks to the backend through traits; backend/
// implements those traits with ash.
//
// =============================================================================

pub mod backend;
pub mod camera;
pub mod config;
pub mod draw;
pub mod error;
pub mod frame;
pub mod scene;

pub use error::{FrameError, Result};
pub use frame::{Renderer, MAX_FRAMES_IN_FLIGHT};

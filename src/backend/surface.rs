// Window surface
//
// winit window seen through the renderer's PresentationSurface trait. The
// application forwards resize events with notify_resized.

use ash::vk;
use std::sync::Arc;
use std::time::Duration;
use winit::window::Window;

use crate::frame::PresentationSurface;

/// How long wait_events sleeps before the size is read again
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(16);

pub struct WindowSurface {
    window: Arc<Window>,
    resized: bool,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            resized: false,
        }
    }

    /// Record that the window size changed since the last present
    pub fn notify_resized(&mut self) {
        self.resized = true;
    }

    /// True while the window has no drawable area. The application checks
    /// this before every frame, so the renderer only ever blocks on a window
    /// minimized while a frame was in flight.
    pub fn is_minimized(&self) -> bool {
        let size = self.window.inner_size();
        size.width == 0 || size.height == 0
    }
}

impl PresentationSurface for WindowSurface {
    fn extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    // winit 0.30 delivers events only through the application handler, so no
    // events are pumped here. inner_size asks the platform for the current
    // size, which turns non-zero again once the window is restored.
    fn wait_events(&mut self) {
        std::thread::sleep(EVENT_POLL_INTERVAL);
    }
}

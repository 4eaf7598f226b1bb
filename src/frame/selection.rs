// Swapchain negotiation
//
// Pure functions over the surface's reported capabilities. Given the same
// capability set they always pick the same configuration, so recreating
// against an unchanged surface reproduces the previous formats exactly.

use ash::vk;

use crate::error::{FrameError, Result};

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Negotiated swapchain parameters
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

/// Prefer sRGB BGRA; otherwise take whatever the surface lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| formats.first())
        .copied()
}

// MAILBOX: never blocks the producer, no tearing
// FIFO: vsync, guaranteed available
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the surface's extent unless it reports the "match the window" sentinel,
/// in which case the window size is clamped into the supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One image more than the minimum, unless the surface caps it (0 = no cap).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

/// First candidate the device can use as an optimal-tiling depth attachment.
pub fn choose_depth_format(
    candidates: &[vk::Format],
    supports_depth_attachment: impl Fn(vk::Format) -> bool,
) -> Option<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| supports_depth_attachment(format))
}

pub fn negotiate(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    formats: &[vk::SurfaceFormatKHR],
    present_modes: &[vk::PresentModeKHR],
    window_extent: vk::Extent2D,
) -> Result<SwapchainConfig> {
    let surface_format = choose_surface_format(formats).ok_or(FrameError::NoSurfaceFormat)?;

    Ok(SwapchainConfig {
        surface_format,
        present_mode: choose_present_mode(present_modes),
        extent: choose_extent(capabilities, window_extent),
        image_count: choose_image_count(capabilities),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn preferred_surface_format_wins_regardless_of_position() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            // right format, wrong color space
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn no_surface_formats_is_an_error() {
        assert!(choose_surface_format(&[]).is_none());
        let err = negotiate(&caps(2, 0), &[], &[vk::PresentModeKHR::FIFO], vk::Extent2D::default());
        assert!(matches!(err, Err(FrameError::NoSurfaceFormat)));
    }

    #[test]
    fn mailbox_preferred_over_fifo() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn fifo_when_mailbox_missing() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&[]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn surface_extent_used_verbatim() {
        let window = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = choose_extent(&caps(2, 0), window);
        assert_eq!(extent, vk::Extent2D { width: 1280, height: 720 });
    }

    #[test]
    fn sentinel_extent_clamps_window_size() {
        let mut capabilities = caps(2, 0);
        capabilities.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        capabilities.min_image_extent = vk::Extent2D {
            width: 100,
            height: 100,
        };
        capabilities.max_image_extent = vk::Extent2D {
            width: 1920,
            height: 1080,
        };

        let inside = choose_extent(&capabilities, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(inside, vk::Extent2D { width: 800, height: 600 });

        let too_big = choose_extent(&capabilities, vk::Extent2D { width: 5000, height: 50 });
        assert_eq!(too_big, vk::Extent2D { width: 1920, height: 100 });
    }

    #[test]
    fn requests_one_more_than_minimum() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
    }

    #[test]
    fn image_count_clamped_to_maximum() {
        assert_eq!(choose_image_count(&caps(2, 2)), 2);
    }

    #[test]
    fn depth_format_takes_first_supported() {
        let supported = |f: vk::Format| f != vk::Format::D32_SFLOAT;
        assert_eq!(
            choose_depth_format(&DEPTH_FORMAT_CANDIDATES, supported),
            Some(vk::Format::D32_SFLOAT_S8_UINT)
        );
        assert_eq!(choose_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| false), None);
    }

    #[test]
    fn negotiation_is_deterministic() {
        let capabilities = caps(2, 3);
        let formats = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        let window = vk::Extent2D {
            width: 640,
            height: 480,
        };

        let first = negotiate(&capabilities, &formats, &modes, window).unwrap();
        for _ in 0..8 {
            let again = negotiate(&capabilities, &formats, &modes, window).unwrap();
            assert_eq!(again.surface_format.format, first.surface_format.format);
            assert_eq!(again.surface_format.color_space, first.surface_format.color_space);
            assert_eq!(again.present_mode, first.present_mode);
            assert_eq!(again.extent, first.extent);
            assert_eq!(again.image_count, first.image_count);
        }
        assert_eq!(first.image_count, 3);
        assert_eq!(first.present_mode, vk::PresentModeKHR::MAILBOX);
    }
}

// Rectangle draw system
//
// Draws each game object as a flat colored rectangle by clearing a region of
// the color attachment. Needs no pipeline, so it works against any render
// pass the swapchain hands out.

use ash::vk;
use glam::{Mat4, Vec3};
use std::sync::Arc;

use super::{DrawSystem, FrameInfo};
use crate::backend::VulkanDevice;

/// Corners of the unit quad every object is drawn as, in object space
const UNIT_QUAD: [Vec3; 4] = [
    Vec3::new(-0.5, -0.5, 0.0),
    Vec3::new(0.5, -0.5, 0.0),
    Vec3::new(0.5, 0.5, 0.0),
    Vec3::new(-0.5, 0.5, 0.0),
];

pub struct RectDrawSystem {
    device: Arc<VulkanDevice>,
}

impl RectDrawSystem {
    pub fn new(device: Arc<VulkanDevice>) -> Self {
        Self { device }
    }
}

impl DrawSystem for RectDrawSystem {
    fn draw(&mut self, frame: &FrameInfo) {
        let view_projection = frame.camera.view_projection();
        for object in frame.objects.iter() {
            let mvp = view_projection * object.transform.mat4();
            let Some(rect) = screen_rect(&mvp, frame.extent) else {
                continue;
            };

            let attachment = vk::ClearAttachment {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                color_attachment: 0,
                clear_value: vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: object.color.extend(1.0).to_array(),
                    },
                },
            };
            let clear_rect = vk::ClearRect {
                rect,
                base_array_layer: 0,
                layer_count: 1,
            };

            // Later objects overwrite earlier ones
            unsafe {
                self.device.device.cmd_clear_attachments(
                    frame.command_buffer,
                    &[attachment],
                    &[clear_rect],
                );
            }
        }
    }
}

/// Pixel rectangle covered by the unit quad under `mvp` (projection * view * model).
///
/// After the perspective divide the quad is in normalized device coordinates
/// (x right, y down, both in [-1, 1]); its bounding box is clipped to
/// `extent`. Returns `None` when nothing of it is visible or a corner lies
/// behind the camera.
pub fn screen_rect(mvp: &Mat4, extent: vk::Extent2D) -> Option<vk::Rect2D> {
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for corner in UNIT_QUAD {
        let clip = *mvp * corner.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let p = clip.truncate() / clip.w;
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let width = extent.width as f32;
    let height = extent.height as f32;
    let to_px = |ndc: f32, size: f32| ((ndc + 1.0) * 0.5 * size).round().clamp(0.0, size);

    let x0 = to_px(min_x, width);
    let x1 = to_px(max_x, width);
    let y0 = to_px(min_y, height);
    let y1 = to_px(max_y, height);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(vk::Rect2D {
        offset: vk::Offset2D {
            x: x0 as i32,
            y: y0 as i32,
        },
        extent: vk::Extent2D {
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, DEFAULT_UP};
    use crate::scene::TransformComponent;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn rect_of(transform: TransformComponent) -> Option<vk::Rect2D> {
        screen_rect(&transform.mat4(), EXTENT)
    }

    #[test]
    fn unit_quad_covers_the_center_half() {
        let rect = rect_of(TransformComponent::default()).unwrap();
        assert_eq!((rect.offset.x, rect.offset.y), (200, 150));
        assert_eq!((rect.extent.width, rect.extent.height), (400, 300));
    }

    #[test]
    fn scale_two_fills_the_screen() {
        let rect = rect_of(TransformComponent {
            scale: 2.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!((rect.offset.x, rect.offset.y), (0, 0));
        assert_eq!(rect.extent, EXTENT);
    }

    #[test]
    fn partially_visible_rect_is_clipped() {
        let rect = rect_of(TransformComponent {
            translation: Vec3::new(1.0, 0.0, 0.0),
            ..Default::default()
        })
        .unwrap();
        // Spans ndc x in [0.5, 1.5]; only [0.5, 1.0] is on screen
        assert_eq!(rect.offset.x, 600);
        assert_eq!(rect.extent.width, 200);
    }

    #[test]
    fn offscreen_object_is_skipped() {
        assert!(rect_of(TransformComponent {
            translation: Vec3::new(5.0, 0.0, 0.0),
            ..Default::default()
        })
        .is_none());
        assert!(rect_of(TransformComponent {
            scale: 0.0,
            ..Default::default()
        })
        .is_none());
    }

    #[test]
    fn rotation_grows_the_bounding_box() {
        let upright = rect_of(TransformComponent {
            scale: 0.5,
            ..Default::default()
        })
        .unwrap();
        let tilted = rect_of(TransformComponent {
            scale: 0.5,
            rotation: Vec3::new(0.0, 0.0, FRAC_PI_4),
            ..Default::default()
        })
        .unwrap();
        assert!(tilted.extent.width > upright.extent.width);
        assert!(tilted.extent.height > upright.extent.height);
    }

    #[test]
    fn aspect_orthographic_camera_keeps_squares_square() {
        let aspect = EXTENT.width as f32 / EXTENT.height as f32;
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-aspect, aspect, -1.0, 1.0, -1.0, 1.0);

        let mvp = camera.view_projection() * TransformComponent::default().mat4();
        let rect = screen_rect(&mvp, EXTENT).unwrap();
        assert_eq!((rect.extent.width, rect.extent.height), (300, 300));
        assert_eq!((rect.offset.x, rect.offset.y), (250, 150));
    }

    #[test]
    fn perspective_camera_shrinks_distant_objects() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(FRAC_PI_2, 800.0 / 600.0, 0.1, 100.0);
        camera.set_view_direction(Vec3::new(0.0, 0.0, -2.0), Vec3::Z, DEFAULT_UP);

        let near = TransformComponent::default();
        let far = TransformComponent {
            translation: Vec3::new(0.0, 0.0, 6.0),
            ..Default::default()
        };
        let near_rect = screen_rect(&(camera.view_projection() * near.mat4()), EXTENT).unwrap();
        let far_rect = screen_rect(&(camera.view_projection() * far.mat4()), EXTENT).unwrap();
        assert!(far_rect.extent.width < near_rect.extent.width);
    }

    #[test]
    fn objects_behind_the_camera_are_skipped() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(FRAC_PI_2, 800.0 / 600.0, 0.1, 100.0);
        camera.set_view_direction(Vec3::new(0.0, 0.0, 5.0), Vec3::Z, DEFAULT_UP);

        let mvp = camera.view_projection() * TransformComponent::default().mat4();
        assert!(screen_rect(&mvp, EXTENT).is_none());
    }
}

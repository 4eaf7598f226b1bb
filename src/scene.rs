// Scene objects
//
// Game objects carry a color and a transform; point lights are game objects
// with an intensity, whose uniform scale doubles as the light radius.

use glam::{Mat4, Vec3};
use std::collections::BTreeMap;

pub type ObjectId = u32;

/// Translation, uniform scale and Tait-Bryan rotation (applied Y, then X, then Z)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    pub translation: Vec3,
    pub scale: f32,
    /// Radians around each axis
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: 1.0,
            rotation: Vec3::ZERO,
        }
    }
}

impl TransformComponent {
    /// translate * Ry * Rx * Rz * scale
    pub fn mat4(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightComponent {
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    id: ObjectId,
    pub color: Vec3,
    pub transform: TransformComponent,
    pub point_light: Option<PointLightComponent>,
}

impl GameObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

/// Owns every game object and hands out ids in creation order
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    next_id: ObjectId,
    objects: BTreeMap<ObjectId, GameObject>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> &mut GameObject {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.entry(id).or_insert(GameObject {
            id,
            color: Vec3::ZERO,
            transform: TransformComponent::default(),
            point_light: None,
        })
    }

    pub fn create_point_light(&mut self, intensity: f32, color: Vec3, radius: f32) -> &mut GameObject {
        let object = self.create();
        object.color = color;
        object.transform.scale = radius;
        object.point_light = Some(PointLightComponent { intensity });
        object
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    /// Objects in id (creation) order
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GameObject> {
        self.objects.values_mut()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

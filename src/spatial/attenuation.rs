//! Distance attenuation model.

use crate::config::AttenuationDesc;

/// Linear-normalized attenuation over clamped Euclidean distance.
///
/// Gain is 1 at or inside the near distance, 0 at or beyond the far distance,
/// and falls linearly in between: `1 - (d - near) / (far - near)`.
#[derive(Debug, Clone, Copy)]
pub struct AttenuationModel {
    near: f32,
    far: f32,
}

impl AttenuationModel {
    /// Builds the model from a validated descriptor.
    pub fn new(desc: &AttenuationDesc) -> Self {
        Self {
            near: desc.near_distance,
            far: desc.far_distance,
        }
    }

    pub fn near_distance(&self) -> f32 {
        self.near
    }

    pub fn far_distance(&self) -> f32 {
        self.far
    }

    pub fn gain_at(&self, distance: f32) -> f32 {
        if distance <= self.near {
            1.0
        } else if distance >= self.far {
            0.0
        } else {
            1.0 - (distance - self.near) / (self.far - self.near)
        }
    }
}

impl Default for AttenuationModel {
    fn default() -> Self {
        Self::new(&AttenuationDesc::default())
    }
}

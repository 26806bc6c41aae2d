//! Math types for MeadowSonic

pub use glam::{Quat, Vec3};

/// Position and orientation of the listener in the 3D world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * (-Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Returns true when every component of the vector is a finite number.
///
/// Malformed geometry (NaN/infinite coordinates) is the one class of input
/// the spatial API rejects at construction time instead of absorbing.
pub fn vec3_is_finite(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_basis_vectors() {
        let pose = Pose::identity();
        assert_eq!(pose.forward(), -Vec3::Z);
        assert_eq!(pose.up(), Vec3::Y);
        assert_eq!(pose.right(), Vec3::X);
    }

    #[test]
    fn test_pose_rotated_basis() {
        // Quarter turn to the left around Y: forward becomes -X.
        let pose = Pose::new(
            Vec3::ZERO,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let fwd = pose.forward();
        assert!((fwd.x - (-1.0)).abs() < 1e-6);
        assert!(fwd.y.abs() < 1e-6);
        assert!(fwd.z.abs() < 1e-6);
    }

    #[test]
    fn test_vec3_finite_guard() {
        assert!(vec3_is_finite(Vec3::new(1.0, -2.0, 3.5)));
        assert!(!vec3_is_finite(Vec3::new(f32::NAN, 0.0, 0.0)));
        assert!(!vec3_is_finite(Vec3::new(0.0, f32::INFINITY, 0.0)));
    }
}

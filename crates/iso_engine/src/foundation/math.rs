//! Math utilities and types
//!
//! Provides the 2D affine and isometric math used by the scenegraph.
//! All entity matrices are homogeneous 3x3 matrices acting on (x, y, 1).

pub use nalgebra::{Matrix3, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 homogeneous matrix used for 2D affine transforms
pub type Mat3 = Matrix3<f32>;

/// 2D point type
pub type Point2 = nalgebra::Point2<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Vertical scale applied to z when projecting into 2:1 isometric space
    pub const ISO_Z_RATIO: f32 = 1.2247;

    /// Divisor applied to a parent's depth to find its visual base center
    pub const ISO_PARENT_DEPTH_DIVISOR: f32 = 1.6;
}

/// Math utility functions
pub mod utils {
    /// Clamp a value between min and max
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        if value < min { min } else if value > max { max } else { value }
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Check every component of a slice is finite
    pub fn all_finite(values: &[f32]) -> bool {
        values.iter().all(|v| v.is_finite())
    }
}

/// Project a 3D point into 2:1 isometric screen space.
///
/// `(x, y, z) -> (x - y, (x + y) / 2 - z * ISO_Z_RATIO)`
pub fn to_iso(point: Vec3) -> Vec2 {
    Vec2::new(
        point.x - point.y,
        (point.x + point.y) * 0.5 - point.z * constants::ISO_Z_RATIO,
    )
}

/// Rotate `point` about `origin` by `radians`.
///
/// Screen space has its origin at the top left with y growing downward, so
/// the y terms carry the opposite sign of the textbook rotation matrix:
///
/// ```text
/// x' = ox + (px - ox) * cos + (py - oy) * sin
/// y' = oy - (px - ox) * sin + (py - oy) * cos
/// ```
///
/// Picking math downstream depends on this exact convention.
pub fn rotate_point(point: Vec2, radians: f32, origin: Vec2) -> Vec2 {
    let (sin, cos) = radians.sin_cos();
    let dx = point.x - origin.x;
    let dy = point.y - origin.y;
    Vec2::new(
        origin.x + dx * cos + dy * sin,
        origin.y - dx * sin + dy * cos,
    )
}

/// Extension trait for Mat3 with 2D affine convenience methods
pub trait Mat3Ext {
    /// Create a 2D translation matrix
    fn translation_2d(x: f32, y: f32) -> Mat3;

    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat3;

    /// Create a 2D non-uniform scaling matrix
    fn scaling_2d(x: f32, y: f32) -> Mat3;

    /// Transform a 2D point (w = 1)
    fn transform_xy(&self, point: Vec2) -> Vec2;

    /// Translation column of the matrix
    fn translation_part(&self) -> Vec2;

    /// Rotation about Z encoded in the matrix, in radians
    fn rotation_radians(&self) -> f32;

    /// Whether every element is finite
    fn is_finite(&self) -> bool;
}

impl Mat3Ext for Mat3 {
    fn translation_2d(x: f32, y: f32) -> Mat3 {
        Mat3::new_translation(&Vec2::new(x, y))
    }

    fn rotation_z(angle: f32) -> Mat3 {
        Mat3::new_rotation(angle)
    }

    fn scaling_2d(x: f32, y: f32) -> Mat3 {
        Mat3::new_nonuniform_scaling(&Vec2::new(x, y))
    }

    fn transform_xy(&self, point: Vec2) -> Vec2 {
        self.transform_point(&Point2::new(point.x, point.y)).coords
    }

    fn translation_part(&self) -> Vec2 {
        Vec2::new(self[(0, 2)], self[(1, 2)])
    }

    fn rotation_radians(&self) -> f32 {
        self[(1, 0)].atan2(self[(0, 0)])
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_iso_projection() {
        let p = to_iso(Vec3::new(10.0, 4.0, 0.0));
        assert_relative_eq!(p.x, 6.0);
        assert_relative_eq!(p.y, 7.0);

        let raised = to_iso(Vec3::new(0.0, 0.0, 10.0));
        assert_relative_eq!(raised.x, 0.0);
        assert_relative_eq!(raised.y, -12.247, epsilon = 1e-4);
    }

    #[test]
    fn test_rotate_point_screen_convention() {
        // A quarter turn moves +x to -y (upward on screen)
        let rotated = rotate_point(Vec2::new(1.0, 0.0), constants::HALF_PI, Vec2::zeros());
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(rotated.y, -1.0, epsilon = 1e-6);

        let about = rotate_point(Vec2::new(6.0, 5.0), constants::HALF_PI, Vec2::new(5.0, 5.0));
        assert_relative_eq!(about.x, 5.0, epsilon = 1e-6);
        assert_relative_eq!(about.y, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_affine_helpers() {
        let m = Mat3::translation_2d(3.0, 4.0) * Mat3::rotation_z(constants::HALF_PI);
        assert_relative_eq!(m.rotation_radians(), constants::HALF_PI, epsilon = 1e-6);
        assert_relative_eq!(m.translation_part(), Vec2::new(3.0, 4.0));

        let p = m.transform_xy(Vec2::new(1.0, 0.0));
        assert_relative_eq!(p, Vec2::new(3.0, 5.0), epsilon = 1e-6);
        assert!(m.is_finite());
    }
}

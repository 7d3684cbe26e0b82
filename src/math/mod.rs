use cgmath::{InnerSpace, Matrix4, Quaternion, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

pub type Vec2f = Vector2<f32>;
pub type Vec3f = Vector3<f32>;
pub type Vec4f = Vector4<f32>;
pub type Quatf = Quaternion<f32>;
pub type Mat4f = Matrix4<f32>;

/// Smallest squared length we still treat as a usable direction.
pub const LENGTH_EPSILON: f32 = f32::MIN_POSITIVE;

pub fn vec3_zero() -> Vec3f {
    Vector3::new(0.0, 0.0, 0.0)
}

pub fn quat_identity() -> Quatf {
    Quaternion::new(1.0, 0.0, 0.0, 0.0)
}

pub fn vec3_to_slice(v: &Vec3f) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// glTF stores quaternions as (x, y, z, w).
pub fn quat_to_slice(q: &Quatf) -> [f32; 4] {
    [q.v.x, q.v.y, q.v.z, q.s]
}

pub fn has_nan(values: &[f32]) -> bool {
    values.iter().any(|v| v.is_nan())
}

/// Normalize `v`, or return `None` when it is too short to carry a direction.
pub fn try_normalize(v: Vec3f) -> Option<Vec3f> {
    if v.magnitude2() < LENGTH_EPSILON {
        None
    } else {
        Some(v.normalize())
    }
}

pub fn clamp_unit(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

pub fn clamp_unit3(v: Vec3f) -> [f32; 3] {
    [clamp_unit(v.x), clamp_unit(v.y), clamp_unit(v.z)]
}

pub fn clamp_unit4(v: Vec4f) -> [f32; 4] {
    [clamp_unit(v.x), clamp_unit(v.y), clamp_unit(v.z), clamp_unit(v.w)]
}

// ============================================================================
// Axis-aligned bounds
// ============================================================================

/// Axis-aligned bounding box that starts out empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3f,
    pub max: Vec3f,
    pub initialized: bool,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: vec3_zero(),
            max: vec3_zero(),
            initialized: false,
        }
    }
}

impl Bounds {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn add_point(&mut self, p: Vec3f) {
        if !self.initialized {
            self.min = p;
            self.max = p;
            self.initialized = true;
            return;
        }
        self.min = Vector3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Vector3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn contains(&self, p: Vec3f) -> bool {
        self.initialized
            && p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }

    /// Component-wise min/max as JSON arrays, for accessor bounds.
    pub fn to_json_min_max(&self) -> Option<(serde_json::Value, serde_json::Value)> {
        if !self.initialized {
            return None;
        }
        Some((
            serde_json::json!(vec3_to_slice(&self.min)),
            serde_json::json!(vec3_to_slice(&self.max)),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_start_empty_and_grow() {
        let mut b = Bounds::default();
        assert!(!b.initialized);
        assert!(b.to_json_min_max().is_none());

        b.add_point(Vector3::new(1.0, -2.0, 3.0));
        b.add_point(Vector3::new(-1.0, 4.0, 0.5));

        assert_eq!(b.min, Vector3::new(-1.0, -2.0, 0.5));
        assert_eq!(b.max, Vector3::new(1.0, 4.0, 3.0));
        assert!(b.contains(Vector3::new(0.0, 0.0, 1.0)));
        assert!(!b.contains(Vector3::new(0.0, 5.0, 1.0)));
    }

    #[test]
    fn bounds_clear_resets() {
        let mut b = Bounds::default();
        b.add_point(Vector3::new(1.0, 1.0, 1.0));
        b.clear();
        assert!(!b.initialized);
        b.add_point(Vector3::new(5.0, 5.0, 5.0));
        assert_eq!(b.min, b.max);
    }

    #[test]
    fn quaternion_slice_is_xyzw() {
        let q = Quaternion::new(0.5, 0.1, 0.2, 0.3);
        assert_eq!(quat_to_slice(&q), [0.1, 0.2, 0.3, 0.5]);
    }

    #[test]
    fn try_normalize_rejects_zero() {
        assert!(try_normalize(vec3_zero()).is_none());
        let n = try_normalize(Vector3::new(0.0, 3.0, 4.0)).unwrap();
        assert!((n.magnitude() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_helpers() {
        assert_eq!(clamp_unit3(Vector3::new(-1.0, 0.5, 2.0)), [0.0, 0.5, 1.0]);
        assert_eq!(clamp_unit4(Vector4::new(2.0, 0.25, -0.1, 1.0)), [1.0, 0.25, 0.0, 1.0]);
    }

    #[test]
    fn nan_detection() {
        assert!(has_nan(&[0.0, f32::NAN]));
        assert!(!has_nan(&[0.0, 1.0, -2.0]));
    }
}

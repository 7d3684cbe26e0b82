use cgmath::{InnerSpace, Vector3};
use serde::{Deserialize, Serialize};

use super::types::ATTR_NORMAL;
use super::RawModel;
use crate::math::{try_normalize, vec3_zero, Vec3f, LENGTH_EPSILON};

/// When to (re)generate vertex normals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeNormals {
    Never,
    #[default]
    Broken,
    Missing,
    Always,
}

impl RawModel {
    /// Generate normals according to `mode`. Returns how many vertices got
    /// a new normal.
    pub fn transform_geometry(&mut self, mode: ComputeNormals) -> usize {
        let eligible: Vec<bool> = match mode {
            ComputeNormals::Never => return 0,
            ComputeNormals::Missing => {
                if self.vertex_attributes & ATTR_NORMAL != 0 {
                    return 0;
                }
                vec![true; self.vertices.len()]
            }
            ComputeNormals::Broken => self
                .vertices
                .iter()
                .map(|v| v.normal.magnitude2() < LENGTH_EPSILON)
                .collect(),
            ComputeNormals::Always => vec![true; self.vertices.len()],
        };

        let computed = self.compute_normals(&eligible);
        self.vertex_attributes |= ATTR_NORMAL;
        if computed > 0 {
            log::info!("Computed {} vertex normals ({:?})", computed, mode);
        }
        computed
    }

    fn compute_normals(&mut self, eligible: &[bool]) -> usize {
        if !eligible.iter().any(|e| *e) {
            return 0;
        }

        let mut accumulated = vec![vec3_zero(); self.vertices.len()];
        let mut touched = vec![false; self.vertices.len()];

        for tri in &self.triangles {
            let p = tri.verts.map(|v| self.vertices[v].position);
            let contribution = face_normal_contribution(&p);
            for &v in &tri.verts {
                if eligible[v] {
                    touched[v] = true;
                    if let Some(c) = contribution {
                        accumulated[v] += c;
                    }
                }
            }
        }

        let centroid = self.centroid();
        let mut computed = 0;
        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            if !touched[i] {
                continue;
            }
            vertex.normal = try_normalize(accumulated[i])
                .or_else(|| try_normalize(vertex.position - centroid))
                .unwrap_or(Vector3::new(0.0, 1.0, 0.0));
            computed += 1;
        }

        self.reindex_vertices();
        computed
    }

    fn centroid(&self) -> Vec3f {
        if self.vertices.is_empty() {
            return vec3_zero();
        }
        let sum = self
            .vertices
            .iter()
            .fold(vec3_zero(), |acc, v| acc + v.position);
        sum / self.vertices.len() as f32
    }
}

/// Area- and angle-weighted face normal, pivoting on the corner opposite the
/// longest edge. `None` for degenerate triangles.
fn face_normal_contribution(p: &[Vec3f; 3]) -> Option<Vec3f> {
    let l0 = (p[1] - p[0]).magnitude2();
    let l1 = (p[2] - p[1]).magnitude2();
    let l2 = (p[0] - p[2]).magnitude2();
    // edge k runs p[k] -> p[k+1], so the corner opposite it is p[k+2]
    let pivot = if l0 > l1 {
        if l0 > l2 {
            2
        } else {
            1
        }
    } else if l1 > l2 {
        0
    } else {
        1
    };

    let e0 = p[(pivot + 1) % 3] - p[pivot];
    let e1 = p[(pivot + 2) % 3] - p[pivot];
    let cross = e0.cross(e1);
    let direction = try_normalize(cross)?;

    let cos = match (try_normalize(e0), try_normalize(e1)) {
        (Some(a), Some(b)) => a.dot(b).clamp(-1.0, 1.0),
        _ => return None,
    };
    let angle = cos.acos();
    let area = cross.magnitude() * 0.5;
    Some(direction * angle * area)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::types::*;

    fn model_with(positions: &[[f32; 3]], tris: &[[usize; 3]]) -> RawModel {
        let mut model = RawModel::new();
        let s = model.add_surface_by_id("s", 1);
        let idx: Vec<usize> = positions
            .iter()
            .map(|p| model.add_vertex(RawVertex::at(p[0], p[1], p[2])))
            .collect();
        for t in tris {
            model.add_triangle(idx[t[0]], idx[t[1]], idx[t[2]], 0, s);
        }
        model
    }

    fn assert_unit(v: Vec3f) {
        assert!(!v.x.is_nan() && !v.y.is_nan() && !v.z.is_nan());
        assert!((v.magnitude() - 1.0).abs() < 1e-5, "not unit: {:?}", v);
    }

    #[test]
    fn flat_triangle_points_along_z() {
        let mut model = model_with(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[[0, 1, 2]]);
        assert_eq!(model.transform_geometry(ComputeNormals::Always), 3);
        for v in model.vertices() {
            assert!((v.normal - Vector3::new(0.0, 0.0, 1.0)).magnitude() < 1e-5);
        }
        assert_ne!(model.vertex_attributes() & ATTR_NORMAL, 0);
    }

    #[test]
    fn collinear_triangle_falls_back_to_unit_normals() {
        let mut model = model_with(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]], &[[0, 1, 2]]);
        model.transform_geometry(ComputeNormals::Always);
        for v in model.vertices() {
            assert_unit(v.normal);
        }
        // the middle vertex sits on the centroid, so it ends up +Y
        assert_eq!(model.vertex(1).normal, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn never_leaves_normals_alone() {
        let mut model = model_with(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[[0, 1, 2]]);
        assert_eq!(model.transform_geometry(ComputeNormals::Never), 0);
        assert_eq!(model.vertex(0).normal, vec3_zero());
    }

    #[test]
    fn missing_skips_models_with_normals() {
        let mut model = model_with(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[[0, 1, 2]]);
        model.add_vertex_attribute(ATTR_NORMAL);
        assert_eq!(model.transform_geometry(ComputeNormals::Missing), 0);
    }

    #[test]
    fn broken_only_fixes_zero_normals() {
        let mut model = RawModel::new();
        let s = model.add_surface_by_id("s", 1);
        let mut good = RawVertex::at(0.0, 0.0, 0.0);
        good.normal = Vector3::new(1.0, 0.0, 0.0);
        let a = model.add_vertex(good);
        let b = model.add_vertex(RawVertex::at(1.0, 0.0, 0.0));
        let c = model.add_vertex(RawVertex::at(0.0, 1.0, 0.0));
        model.add_triangle(a, b, c, 0, s);

        assert_eq!(model.transform_geometry(ComputeNormals::Broken), 2);
        assert_eq!(model.vertex(a).normal, Vector3::new(1.0, 0.0, 0.0));
        assert_unit(model.vertex(b).normal);
    }

    #[test]
    fn pivot_is_opposite_longest_edge() {
        // longest edge p0 -> p1, pivot is p2
        let p = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(4.0, 0.0, 0.0),
            Vector3::new(2.0, 1.0, 0.0),
        ];
        let c = face_normal_contribution(&p).unwrap();
        assert!(c.z > 0.0);
        assert!(c.x.abs() < 1e-6 && c.y.abs() < 1e-6);
    }
}

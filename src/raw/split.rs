use super::types::*;
use super::RawModel;

/// Highest vertex count a sub-model may reach under 16-bit indices.
pub const SHORT_INDEX_VERTEX_BUDGET: usize = u16::MAX as usize;

impl RawModel {
    /// Split the model into one sub-model per run of triangles sharing a
    /// material (and, for discrete surfaces, a surface).
    ///
    /// Opaque triangles come first in ascending (material, surface, first
    /// vertex) order, then transparent ones with the first vertex descending.
    /// Sub-model materials keep texture indices into this model's texture
    /// arena.
    pub fn create_material_models(
        &self,
        short_indices: bool,
        keep_attribs: Option<u32>,
        force_discrete: bool,
    ) -> Vec<RawModel> {
        let (mut opaque, mut transparent): (Vec<&RawTriangle>, Vec<&RawTriangle>) = self
            .triangles
            .iter()
            .partition(|tri| !self.is_transparent_triangle(tri));

        opaque.sort_by_key(|t| (t.material_index, t.surface_index, t.verts[0]));
        transparent.sort_by(|a, b| {
            (a.material_index, a.surface_index)
                .cmp(&(b.material_index, b.surface_index))
                .then_with(|| b.verts[0].cmp(&a.verts[0]))
        });

        let mut models: Vec<RawModel> = Vec::new();
        let mut previous: Option<&RawTriangle> = None;

        for tri in opaque.into_iter().chain(transparent) {
            let start_new = match (previous, models.last()) {
                (Some(prev), Some(current)) => {
                    prev.material_index != tri.material_index
                        || (prev.surface_index != tri.surface_index
                            && (force_discrete
                                || self.surfaces[prev.surface_index].discrete
                                || self.surfaces[tri.surface_index].discrete))
                        || (short_indices
                            && current.vertex_count() + 3 > SHORT_INDEX_VERTEX_BUDGET)
                }
                _ => true,
            };
            if start_new {
                models.push(RawModel {
                    root_node_id: self.root_node_id,
                    global_max_weights: self.global_max_weights,
                    ..RawModel::default()
                });
            }
            previous = Some(tri);

            let Some(model) = models.last_mut() else {
                continue;
            };
            self.append_triangle(model, tri, keep_attribs);
        }

        log::debug!(
            "Split {} triangles into {} material models",
            self.triangles.len(),
            models.len()
        );
        models
    }

    fn is_transparent_triangle(&self, tri: &RawTriangle) -> bool {
        let material = &self.materials[tri.material_index];
        let diffuse = material
            .textures
            .get(TextureUsage::Diffuse)
            .or_else(|| material.textures.get(TextureUsage::Albedo));
        match diffuse {
            Some(tex) => self.textures[tex].occlusion == TextureOcclusion::Transparent,
            // vertex alpha only counts when the model carries colors
            None => {
                self.vertex_attributes & ATTR_COLOR != 0
                    && tri.verts.iter().any(|&v| self.vertices[v].color.w < 1.0)
            }
        }
    }

    fn append_triangle(&self, model: &mut RawModel, tri: &RawTriangle, keep_attribs: Option<u32>) {
        let source_surface = &self.surfaces[tri.surface_index];
        let surface_index = match model.surface_index_by_id(source_surface.id) {
            Some(index) => index,
            None => {
                let mut surface = source_surface.clone();
                surface.bounds.clear();
                model.surfaces.push(surface);
                for joint_id in &source_surface.joint_ids {
                    if let Some(node_index) = self.node_index_by_id(*joint_id) {
                        model.add_node(self.nodes[node_index].clone());
                    }
                }
                model.surfaces.len() - 1
            }
        };

        let material = &self.materials[tri.material_index];
        let material_index = model.add_material(material.clone());
        let keep = keep_attribs.map(|mask| expand_keep_mask(mask, material));
        let default_vertex = RawVertex::default();

        let mut verts = [0usize; 3];
        for (corner, &source) in tri.verts.iter().enumerate() {
            let mut vertex = self.vertices[source].clone();
            if let Some(mask) = keep {
                strip_channels(&mut vertex, mask, &default_vertex);
            }
            model.vertex_attributes |= vertex.difference(&default_vertex);
            model.surfaces[surface_index].bounds.add_point(vertex.position);
            verts[corner] = model.add_vertex(vertex);
        }
        model.add_triangle(verts[0], verts[1], verts[2], material_index, surface_index);
    }
}

/// Resolve `ATTR_AUTO` against the material's bound textures; keeping
/// positions always keeps skinning.
fn expand_keep_mask(mask: u32, material: &RawMaterial) -> u32 {
    let mut keep = mask;
    if keep & ATTR_AUTO != 0 {
        keep |= ATTR_POSITION;
        let slots = &material.textures;
        if slots.get(TextureUsage::Diffuse).is_some() || slots.get(TextureUsage::Albedo).is_some() {
            keep |= ATTR_UV0;
        }
        if slots.get(TextureUsage::Normal).is_some() {
            keep |= ATTR_NORMAL | ATTR_TANGENT | ATTR_BINORMAL | ATTR_UV0;
        }
        if slots.get(TextureUsage::Specular).is_some() {
            keep |= ATTR_NORMAL | ATTR_UV0;
        }
        if slots.get(TextureUsage::Emissive).is_some() {
            keep |= ATTR_UV1;
        }
    }
    if keep & ATTR_POSITION != 0 {
        keep |= ATTR_JOINT_INDICES | ATTR_JOINT_WEIGHTS;
    }
    keep
}

fn strip_channels(vertex: &mut RawVertex, keep: u32, default: &RawVertex) {
    if keep & ATTR_POSITION == 0 {
        vertex.position = default.position;
    }
    if keep & ATTR_NORMAL == 0 {
        vertex.normal = default.normal;
    }
    if keep & ATTR_TANGENT == 0 {
        vertex.tangent = default.tangent;
    }
    if keep & ATTR_BINORMAL == 0 {
        vertex.binormal = default.binormal;
    }
    if keep & ATTR_COLOR == 0 {
        vertex.color = default.color;
    }
    if keep & ATTR_UV0 == 0 {
        vertex.uv0 = default.uv0;
    }
    if keep & ATTR_UV1 == 0 {
        vertex.uv1 = default.uv1;
    }
    if keep & ATTR_JOINT_INDICES == 0 {
        vertex.joint_indices.clone_from(&default.joint_indices);
    }
    if keep & ATTR_JOINT_WEIGHTS == 0 {
        vertex.joint_weights.clone_from(&default.joint_weights);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Vector2, Vector3, Vector4};

    fn flat_material(name: &str, textures: TextureSlots) -> RawMaterial {
        RawMaterial {
            id: 0,
            name: name.to_string(),
            material_type: RawMaterialType::Opaque,
            props: RawMatProps::Traditional(TraditionalProps {
                shading_model: ShadingModel::Lambert,
                ambient_factor: Vector3::new(0.0, 0.0, 0.0),
                diffuse_factor: Vector4::new(1.0, 1.0, 1.0, 1.0),
                emissive_factor: Vector3::new(0.0, 0.0, 0.0),
                specular_factor: Vector3::new(0.0, 0.0, 0.0),
                shininess: 0.0,
            }),
            textures,
            user_properties: vec![],
        }
    }

    fn vertex(x: f32, y: f32, z: f32, alpha: f32) -> RawVertex {
        let mut v = RawVertex::at(x, y, z);
        v.color = Vector4::new(1.0, 1.0, 1.0, alpha);
        v.uv0 = Vector2::new(x, y);
        v
    }

    #[test]
    fn splits_by_material() {
        let mut model = RawModel::new();
        let red = model.add_material(flat_material("red", TextureSlots::default()));
        let blue = model.add_material(flat_material("blue", TextureSlots::default()));
        let s = model.add_surface_by_id("s", 1);
        let v: Vec<usize> = (0..6).map(|i| model.add_vertex(vertex(i as f32, 0.0, 0.0, 1.0))).collect();
        model.add_triangle(v[0], v[1], v[2], blue, s);
        model.add_triangle(v[3], v[4], v[5], red, s);

        let parts = model.create_material_models(false, None, true);
        assert_eq!(parts.len(), 2);
        // opaque ascending by material index
        assert_eq!(parts[0].material(0).name, "red");
        assert_eq!(parts[1].material(0).name, "blue");
        assert_eq!(parts[0].root_node(), model.root_node());
    }

    #[test]
    fn transparent_triangles_come_last() {
        let mut model = RawModel::new();
        let m = model.add_material(flat_material("m", TextureSlots::default()));
        let glass = model.add_material(flat_material("glass", TextureSlots::default()));
        let s = model.add_surface_by_id("s", 1);
        model.add_vertex_attribute(ATTR_POSITION | ATTR_COLOR);
        let a = model.add_vertex(vertex(0.0, 0.0, 0.0, 0.5));
        let b = model.add_vertex(vertex(1.0, 0.0, 0.0, 1.0));
        let c = model.add_vertex(vertex(0.0, 1.0, 0.0, 1.0));
        let d = model.add_vertex(vertex(0.0, 0.0, 1.0, 1.0));
        model.add_triangle(a, b, c, m, s);
        model.add_triangle(b, c, d, glass, s);

        let parts = model.create_material_models(false, None, true);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].material(0).name, "glass");
        assert_eq!(parts[1].material(0).name, "m");

        // without a color channel the default alpha is ignored
        model.vertex_attributes = ATTR_POSITION;
        let parts = model.create_material_models(false, None, true);
        assert_eq!(parts[0].material(0).name, "m");
    }

    #[test]
    fn non_discrete_surfaces_share_a_sub_model() {
        let mut model = RawModel::new();
        let m = model.add_material(flat_material("m", TextureSlots::default()));
        let s0 = model.add_surface_by_id("a", 1);
        let s1 = model.add_surface_by_id("b", 2);
        let v: Vec<usize> = (0..6).map(|i| model.add_vertex(vertex(i as f32, 1.0, 0.0, 1.0))).collect();
        model.add_triangle(v[0], v[1], v[2], m, s0);
        model.add_triangle(v[3], v[4], v[5], m, s1);

        assert_eq!(model.create_material_models(false, None, false).len(), 1);
        assert_eq!(model.create_material_models(false, None, true).len(), 2);

        model.surface_mut(s1).discrete = true;
        assert_eq!(model.create_material_models(false, None, false).len(), 2);
    }

    #[test]
    fn keep_mask_strips_channels() {
        let mut model = RawModel::new();
        let m = model.add_material(flat_material("m", TextureSlots::default()));
        let s = model.add_surface_by_id("s", 1);
        let a = model.add_vertex(vertex(0.0, 0.0, 0.0, 1.0));
        let b = model.add_vertex(vertex(1.0, 0.0, 0.0, 1.0));
        let c = model.add_vertex(vertex(0.0, 1.0, 0.0, 1.0));
        model.add_triangle(a, b, c, m, s);

        let parts = model.create_material_models(false, Some(ATTR_POSITION), true);
        let part = &parts[0];
        assert_eq!(part.vertex_attributes(), ATTR_POSITION);
        assert!(part.vertices().iter().all(|v| v.uv0 == Vector2::new(0.0, 0.0)));

        let parts = model.create_material_models(false, None, true);
        assert_ne!(parts[0].vertex_attributes() & ATTR_UV0, 0);
        assert_ne!(parts[0].vertex_attributes() & ATTR_COLOR, 0);
    }

    #[test]
    fn auto_mask_follows_textures() {
        let mat = flat_material("m", TextureSlots::default().with(TextureUsage::Normal, 0));
        let keep = expand_keep_mask(ATTR_AUTO, &mat);
        assert_ne!(keep & ATTR_TANGENT, 0);
        assert_ne!(keep & ATTR_UV0, 0);
        assert_ne!(keep & ATTR_JOINT_WEIGHTS, 0);
        assert_eq!(keep & ATTR_UV1, 0);
        assert_eq!(keep & ATTR_COLOR, 0);
    }

    #[test]
    fn sub_model_bounds_cover_only_its_vertices() {
        let mut model = RawModel::new();
        let near = model.add_material(flat_material("near", TextureSlots::default()));
        let far = model.add_material(flat_material("far", TextureSlots::default()));
        let s = model.add_surface_by_id("s", 1);
        let v: Vec<usize> = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [10.0, 10.0, 10.0], [11.0, 10.0, 10.0], [10.0, 11.0, 10.0]]
            .iter()
            .map(|p| model.add_vertex(vertex(p[0], p[1], p[2], 1.0)))
            .collect();
        model.add_triangle(v[0], v[1], v[2], near, s);
        model.add_triangle(v[3], v[4], v[5], far, s);

        let parts = model.create_material_models(false, None, true);
        let bounds = parts[0].surface(0).bounds;
        assert_eq!(bounds.max, Vector3::new(1.0, 1.0, 0.0));
        let bounds = parts[1].surface(0).bounds;
        assert_eq!(bounds.min, Vector3::new(10.0, 10.0, 10.0));
        for part in &parts {
            for tri in part.triangles() {
                assert!(tri.verts.iter().all(|&i| i < part.vertex_count()));
            }
        }
    }

    #[test]
    fn joint_nodes_follow_their_surface() {
        let mut model = RawModel::new();
        model.add_node_by_id(1, "root", None);
        let mut joint = RawNode::new(2, "bone", Some(1));
        joint.is_joint = true;
        model.add_node(joint);
        let m = model.add_material(flat_material("m", TextureSlots::default()));
        let s = model.add_surface_by_id("s", 1);
        model.surface_mut(s).joint_ids = vec![2];
        let a = model.add_vertex(vertex(0.0, 0.0, 0.0, 1.0));
        let b = model.add_vertex(vertex(1.0, 0.0, 0.0, 1.0));
        let c = model.add_vertex(vertex(0.0, 1.0, 0.0, 1.0));
        model.add_triangle(a, b, c, m, s);

        let parts = model.create_material_models(false, None, true);
        assert_eq!(parts[0].nodes().len(), 1);
        assert_eq!(parts[0].node(0).name, "bone");
    }
}

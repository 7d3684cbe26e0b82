//! Neutral intermediate scene model.
//!
//! A `RawModel` is filled once by an importer, consolidated in place
//! (`transform_textures`, `transform_geometry`, `condense`) and then split
//! into one read-only sub-model per material with `create_material_models`.
//! Every entity lives in a per-type arena and is addressed by index.

pub mod condense;
pub mod normals;
pub mod split;
pub mod types;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::image_utils;
use crate::math::Vec2f;

pub use normals::ComputeNormals;
pub use types::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawModel {
    root_node_id: i64,
    vertex_attributes: u32,
    global_max_weights: usize,
    #[serde(skip)]
    vertex_hash: HashMap<RawVertex, usize>,
    vertices: Vec<RawVertex>,
    triangles: Vec<RawTriangle>,
    textures: Vec<RawTexture>,
    materials: Vec<RawMaterial>,
    lights: Vec<RawLight>,
    surfaces: Vec<RawSurface>,
    animations: Vec<RawAnimation>,
    cameras: Vec<RawCamera>,
    nodes: Vec<RawNode>,
}

impl RawModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a model serialized as JSON, rebuilding the vertex lookup.
    pub fn load_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene model: {}", path.display()))?;
        let mut model: RawModel = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse scene model: {}", path.display()))?;
        model.reindex_vertices();
        Ok(model)
    }

    /// Rebuild the vertex dedup map from the vertex arena.
    pub fn reindex_vertices(&mut self) {
        self.vertex_hash.clear();
        for (i, v) in self.vertices.iter().enumerate() {
            self.vertex_hash.entry(v.clone()).or_insert(i);
        }
    }

    // ========================================================================
    // Insertion with dedup
    // ========================================================================

    pub fn add_vertex_attribute(&mut self, attrib: u32) {
        self.vertex_attributes |= attrib;
    }

    /// Insert a vertex, returning the index of an equal one if present.
    pub fn add_vertex(&mut self, vertex: RawVertex) -> usize {
        if let Some(&index) = self.vertex_hash.get(&vertex) {
            return index;
        }
        let index = self.vertices.len();
        self.vertex_hash.insert(vertex.clone(), index);
        self.vertices.push(vertex);
        index
    }

    pub fn add_triangle(
        &mut self,
        v0: usize,
        v1: usize,
        v2: usize,
        material_index: usize,
        surface_index: usize,
    ) -> usize {
        self.triangles.push(RawTriangle {
            verts: [v0, v1, v2],
            material_index,
            surface_index,
        });
        self.triangles.len() - 1
    }

    /// Register a texture, probing its file for size and opacity.
    /// Returns `None` for a texture without a name.
    pub fn add_texture(
        &mut self,
        name: &str,
        file_name: &str,
        file_location: &str,
        usage: TextureUsage,
    ) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        if let Some(existing) = self.find_texture(name, file_location, usage) {
            return Some(existing);
        }

        let probe_path = if file_location.is_empty() { file_name } else { file_location };
        let properties = image_utils::image_properties(Path::new(probe_path));
        let max_side = properties.width.max(properties.height).max(1) as f32;

        self.textures.push(RawTexture {
            name: name.to_string(),
            width: properties.width,
            height: properties.height,
            mip_levels: max_side.log2().ceil() as u32,
            usage,
            occlusion: properties.occlusion,
            file_name: file_name.to_string(),
            file_location: file_location.to_string(),
        });
        Some(self.textures.len() - 1)
    }

    /// Insert an already-probed texture record.
    pub fn add_texture_record(&mut self, texture: RawTexture) -> usize {
        if let Some(existing) = self.find_texture(&texture.name, &texture.file_location, texture.usage) {
            return existing;
        }
        self.textures.push(texture);
        self.textures.len() - 1
    }

    fn find_texture(&self, name: &str, file_location: &str, usage: TextureUsage) -> Option<usize> {
        self.textures.iter().position(|t| {
            t.usage == usage
                && t.file_location.eq_ignore_ascii_case(file_location)
                && t.name.eq_ignore_ascii_case(name)
        })
    }

    pub fn add_material(&mut self, material: RawMaterial) -> usize {
        if let Some(existing) = self.materials.iter().position(|m| *m == material) {
            return existing;
        }
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_light(
        &mut self,
        name: &str,
        light_type: RawLightType,
        color: crate::math::Vec3f,
        intensity: f32,
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    ) -> usize {
        let existing = self.lights.iter().position(|l| {
            if l.name != name || l.light_type != light_type {
                return false;
            }
            // cone angles only matter for spots
            l.light_type != RawLightType::Spot
                || (l.inner_cone_angle == inner_cone_angle && l.outer_cone_angle == outer_cone_angle)
        });
        if let Some(index) = existing {
            return index;
        }
        self.lights.push(RawLight {
            name: name.to_string(),
            light_type,
            color,
            intensity,
            inner_cone_angle,
            outer_cone_angle,
        });
        self.lights.len() - 1
    }

    /// Insert a full surface record, deduplicated by case-insensitive name.
    pub fn add_surface(&mut self, surface: RawSurface) -> usize {
        if let Some(existing) = self
            .surfaces
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(&surface.name))
        {
            return existing;
        }
        self.surfaces.push(surface);
        self.surfaces.len() - 1
    }

    /// Insert an empty surface, deduplicated by id.
    pub fn add_surface_by_id(&mut self, name: &str, surface_id: i64) -> usize {
        if let Some(existing) = self.surface_index_by_id(surface_id) {
            return existing;
        }
        self.surfaces.push(RawSurface::new(surface_id, name));
        self.surfaces.len() - 1
    }

    pub fn add_animation(&mut self, animation: RawAnimation) -> usize {
        self.animations.push(animation);
        self.animations.len() - 1
    }

    pub fn add_camera_perspective(
        &mut self,
        name: &str,
        node_id: i64,
        aspect_ratio: f32,
        fov_degrees_x: f32,
        fov_degrees_y: f32,
        near_z: f32,
        far_z: f32,
    ) -> usize {
        self.cameras.push(RawCamera {
            name: name.to_string(),
            node_id,
            projection: CameraProjection::Perspective {
                aspect_ratio,
                fov_degrees_x,
                fov_degrees_y,
                near_z,
                far_z,
            },
        });
        self.cameras.len() - 1
    }

    pub fn add_camera_orthographic(
        &mut self,
        name: &str,
        node_id: i64,
        mag_x: f32,
        mag_y: f32,
        near_z: f32,
        far_z: f32,
    ) -> usize {
        self.cameras.push(RawCamera {
            name: name.to_string(),
            node_id,
            projection: CameraProjection::Orthographic {
                mag_x,
                mag_y,
                near_z,
                far_z,
            },
        });
        self.cameras.len() - 1
    }

    /// Insert a node record, deduplicated by id.
    pub fn add_node(&mut self, node: RawNode) -> usize {
        if let Some(existing) = self.node_index_by_id(node.id) {
            return existing;
        }
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Insert a default-transform node, deduplicated by id.
    pub fn add_node_by_id(&mut self, id: i64, name: &str, parent_id: Option<i64>) -> usize {
        self.add_node(RawNode::new(id, name, parent_id))
    }

    pub fn set_root_node(&mut self, node_id: i64) {
        self.root_node_id = node_id;
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Apply UV transforms, in order, to every UV set the model carries.
    pub fn transform_textures(&mut self, transforms: &[Box<dyn Fn(Vec2f) -> Vec2f>]) {
        let has_uv0 = self.vertex_attributes & ATTR_UV0 != 0;
        let has_uv1 = self.vertex_attributes & ATTR_UV1 != 0;
        for vertex in &mut self.vertices {
            for transform in transforms {
                if has_uv0 {
                    vertex.uv0 = transform(vertex.uv0);
                }
                if has_uv1 {
                    vertex.uv1 = transform(vertex.uv1);
                }
            }
        }
        self.reindex_vertices();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn root_node(&self) -> i64 {
        self.root_node_id
    }

    pub fn vertex_attributes(&self) -> u32 {
        self.vertex_attributes
    }

    pub fn global_weight_count(&self) -> usize {
        self.global_max_weights
    }

    pub fn vertices(&self) -> &[RawVertex] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> &RawVertex {
        &self.vertices[index]
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangles(&self) -> &[RawTriangle] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn textures(&self) -> &[RawTexture] {
        &self.textures
    }

    pub fn texture(&self, index: usize) -> &RawTexture {
        &self.textures[index]
    }

    pub fn materials(&self) -> &[RawMaterial] {
        &self.materials
    }

    pub fn material(&self, index: usize) -> &RawMaterial {
        &self.materials[index]
    }

    pub fn surfaces(&self) -> &[RawSurface] {
        &self.surfaces
    }

    pub fn surface(&self, index: usize) -> &RawSurface {
        &self.surfaces[index]
    }

    pub fn surface_mut(&mut self, index: usize) -> &mut RawSurface {
        &mut self.surfaces[index]
    }

    pub fn surface_index_by_id(&self, surface_id: i64) -> Option<usize> {
        self.surfaces.iter().position(|s| s.id == surface_id)
    }

    pub fn animations(&self) -> &[RawAnimation] {
        &self.animations
    }

    pub fn cameras(&self) -> &[RawCamera] {
        &self.cameras
    }

    pub fn lights(&self) -> &[RawLight] {
        &self.lights
    }

    pub fn nodes(&self) -> &[RawNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &RawNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut RawNode {
        &mut self.nodes[index]
    }

    pub fn node_index_by_id(&self, node_id: i64) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == node_id)
    }

    /// One attribute per vertex, in vertex order.
    pub fn attribute_array<T: Clone>(&self, get: impl Fn(&RawVertex) -> &T) -> Vec<T> {
        self.vertices.iter().map(|v| get(v).clone()).collect()
    }

    /// One entry of a per-vertex array attribute, in vertex order.
    pub fn array_attribute_array<T: Clone + Default>(
        &self,
        get: impl Fn(&RawVertex) -> &Vec<T>,
        offset: usize,
    ) -> Vec<T> {
        self.vertices
            .iter()
            .map(|v| get(v).get(offset).cloned().unwrap_or_default())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Entity types of the neutral scene model.
//!
//! Entities refer to each other by integer index into the owning
//! [`RawModel`](super::RawModel) arenas, or by the stable `i64` ids the
//! importer assigns to nodes and surfaces.

use std::hash::{Hash, Hasher};

use cgmath::{Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::math::{quat_identity, vec3_zero, Bounds, Mat4f, Quatf, Vec2f, Vec3f, Vec4f};

// ============================================================================
// Vertex attribute mask
// ============================================================================

pub const ATTR_POSITION: u32 = 1 << 0;
pub const ATTR_NORMAL: u32 = 1 << 1;
pub const ATTR_TANGENT: u32 = 1 << 2;
pub const ATTR_BINORMAL: u32 = 1 << 3;
pub const ATTR_COLOR: u32 = 1 << 4;
pub const ATTR_UV0: u32 = 1 << 5;
pub const ATTR_UV1: u32 = 1 << 6;
pub const ATTR_JOINT_INDICES: u32 = 1 << 7;
pub const ATTR_JOINT_WEIGHTS: u32 = 1 << 8;
/// Infer the kept channels from the textures a material binds.
pub const ATTR_AUTO: u32 = 1 << 31;

// ============================================================================
// Vertices and triangles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBlendVertex {
    pub position: Vec3f,
    pub normal: Vec3f,
    pub tangent: Vec4f,
}

impl Default for RawBlendVertex {
    fn default() -> Self {
        Self {
            position: vec3_zero(),
            normal: vec3_zero(),
            tangent: Vector4::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkinningInfo {
    pub joint_index: u32,
    pub joint_weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawVertex {
    pub position: Vec3f,
    pub normal: Vec3f,
    pub binormal: Vec3f,
    /// `w` carries handedness.
    pub tangent: Vec4f,
    pub color: Vec4f,
    pub uv0: Vec2f,
    pub uv1: Vec2f,
    /// Filled by `condense` in 4-wide blocks from `skinning_info`.
    pub joint_indices: Vec<[u32; 4]>,
    pub joint_weights: Vec<[f32; 4]>,
    /// Unsorted (joint, weight) pairs as delivered by the importer.
    pub skinning_info: Vec<SkinningInfo>,
    /// One entry per blend channel of the owning surface.
    pub blends: Vec<RawBlendVertex>,
    pub polarity_uv0: bool,
}

impl Default for RawVertex {
    fn default() -> Self {
        Self {
            position: vec3_zero(),
            normal: vec3_zero(),
            binormal: vec3_zero(),
            tangent: Vector4::new(0.0, 0.0, 0.0, 0.0),
            color: Vector4::new(0.0, 0.0, 0.0, 0.0),
            uv0: Vector2::new(0.0, 0.0),
            uv1: Vector2::new(0.0, 0.0),
            joint_indices: Vec::new(),
            joint_weights: Vec::new(),
            skinning_info: Vec::new(),
            blends: Vec::new(),
            polarity_uv0: false,
        }
    }
}

// Float equality; NaN positions never dedup.
impl Eq for RawVertex {}

impl Hash for RawVertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in [self.position.x, self.position.y, self.position.z] {
            // -0.0 == 0.0, so both must land in the same bucket
            let bits = if c == 0.0 { 0 } else { c.to_bits() };
            bits.hash(state);
        }
    }
}

impl RawVertex {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            ..Default::default()
        }
    }

    /// Mask of attribute channels in which `self` and `other` differ.
    pub fn difference(&self, other: &RawVertex) -> u32 {
        let mut attributes = 0;
        if self.position != other.position {
            attributes |= ATTR_POSITION;
        }
        if self.normal != other.normal {
            attributes |= ATTR_NORMAL;
        }
        if self.tangent != other.tangent {
            attributes |= ATTR_TANGENT;
        }
        if self.binormal != other.binormal {
            attributes |= ATTR_BINORMAL;
        }
        if self.color != other.color {
            attributes |= ATTR_COLOR;
        }
        if self.uv0 != other.uv0 {
            attributes |= ATTR_UV0;
        }
        if self.uv1 != other.uv1 {
            attributes |= ATTR_UV1;
        }
        // joints and weights travel together
        if self.joint_indices != other.joint_indices || self.joint_weights != other.joint_weights {
            attributes |= ATTR_JOINT_INDICES | ATTR_JOINT_WEIGHTS;
        }
        attributes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTriangle {
    pub verts: [usize; 3],
    pub material_index: usize,
    pub surface_index: usize,
}

// ============================================================================
// Materials and textures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadingModel {
    Unknown,
    Constant,
    Lambert,
    Blinn,
    Phong,
    PbrMetRough,
}

impl ShadingModel {
    pub fn describe(&self) -> &'static str {
        match self {
            ShadingModel::Unknown => "<unknown>",
            ShadingModel::Constant => "Constant",
            ShadingModel::Lambert => "Lambert",
            ShadingModel::Blinn => "Blinn",
            ShadingModel::Phong => "Phong",
            ShadingModel::PbrMetRough => "Metallic/Roughness",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureUsage {
    Ambient,
    Diffuse,
    Normal,
    Specular,
    Shininess,
    Emissive,
    Reflection,
    Albedo,
    Occlusion,
    Roughness,
    Metallic,
}

pub const TEXTURE_USAGE_COUNT: usize = 11;

impl TextureUsage {
    pub const ALL: [TextureUsage; TEXTURE_USAGE_COUNT] = [
        TextureUsage::Ambient,
        TextureUsage::Diffuse,
        TextureUsage::Normal,
        TextureUsage::Specular,
        TextureUsage::Shininess,
        TextureUsage::Emissive,
        TextureUsage::Reflection,
        TextureUsage::Albedo,
        TextureUsage::Occlusion,
        TextureUsage::Roughness,
        TextureUsage::Metallic,
    ];

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TextureUsage::Ambient => "ambient",
            TextureUsage::Diffuse => "diffuse",
            TextureUsage::Normal => "normal",
            TextureUsage::Specular => "specular",
            TextureUsage::Shininess => "shininess",
            TextureUsage::Emissive => "emissive",
            TextureUsage::Reflection => "reflection",
            TextureUsage::Albedo => "albedo",
            TextureUsage::Occlusion => "occlusion",
            TextureUsage::Roughness => "roughness",
            TextureUsage::Metallic => "metallic",
        }
    }
}

/// Fixed-size texture slot array, one optional texture index per usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSlots(pub [Option<usize>; TEXTURE_USAGE_COUNT]);

impl TextureSlots {
    pub fn get(&self, usage: TextureUsage) -> Option<usize> {
        self.0[usage.slot()]
    }

    pub fn set(&mut self, usage: TextureUsage, texture: Option<usize>) {
        self.0[usage.slot()] = texture;
    }

    pub fn with(mut self, usage: TextureUsage, texture: usize) -> Self {
        self.set(usage, Some(texture));
        self
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Option<usize>> {
        self.0.iter_mut()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureOcclusion {
    Opaque,
    Transparent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTexture {
    /// Logical name in the source scene.
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub usage: TextureUsage,
    pub occlusion: TextureOcclusion,
    /// File name as written in the source scene.
    pub file_name: String,
    /// Resolved path on the local filesystem, or empty.
    pub file_location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawMaterialType {
    Opaque,
    Transparent,
    SkinnedOpaque,
    SkinnedTransparent,
}

impl RawMaterialType {
    pub fn is_transparent(self) -> bool {
        matches!(self, RawMaterialType::Transparent | RawMaterialType::SkinnedTransparent)
    }
}

/// Lambert / Blinn / Phong style factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraditionalProps {
    pub shading_model: ShadingModel,
    pub ambient_factor: Vec3f,
    pub diffuse_factor: Vec4f,
    pub emissive_factor: Vec3f,
    pub specular_factor: Vec3f,
    pub shininess: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetRoughProps {
    pub diffuse_factor: Vec4f,
    pub emissive_factor: Vec3f,
    pub emissive_intensity: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub invert_roughness_map: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawMatProps {
    Traditional(TraditionalProps),
    MetRough(MetRoughProps),
}

impl RawMatProps {
    pub fn shading_model(&self) -> ShadingModel {
        match self {
            RawMatProps::Traditional(p) => p.shading_model,
            RawMatProps::MetRough(_) => ShadingModel::PbrMetRough,
        }
    }

    pub fn diffuse_factor(&self) -> Vec4f {
        match self {
            RawMatProps::Traditional(p) => p.diffuse_factor,
            RawMatProps::MetRough(p) => p.diffuse_factor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMaterial {
    pub id: i64,
    pub name: String,
    pub material_type: RawMaterialType,
    pub props: RawMatProps,
    pub textures: TextureSlots,
    #[serde(default)]
    pub user_properties: Vec<String>,
}

/// Identity ignores `id`: name, type, factor block, texture slots and user
/// properties must all match.
impl PartialEq for RawMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.material_type == other.material_type
            && self.props == other.props
            && self.textures == other.textures
            && self.user_properties == other.user_properties
    }
}

// ============================================================================
// Lights, cameras, surfaces, animation, nodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawLightType {
    Directional,
    Point,
    Spot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLight {
    pub name: String,
    pub light_type: RawLightType,
    pub color: Vec3f,
    pub intensity: f32,
    /// Spot only.
    pub inner_cone_angle: f32,
    /// Spot only.
    pub outer_cone_angle: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlendChannel {
    pub default_deform: f32,
    pub has_normals: bool,
    pub has_tangents: bool,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSurface {
    pub id: i64,
    pub name: String,
    pub skeleton_root_id: Option<i64>,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub joint_ids: Vec<i64>,
    #[serde(default)]
    pub joint_geometry_mins: Vec<Vec3f>,
    #[serde(default)]
    pub joint_geometry_maxs: Vec<Vec3f>,
    /// One per joint, in column-vector convention (translation in the last
    /// column), so the cgmath columns are written out as glTF expects.
    #[serde(default)]
    pub inverse_bind_matrices: Vec<Mat4f>,
    #[serde(default)]
    pub blend_channels: Vec<RawBlendChannel>,
    #[serde(default)]
    pub discrete: bool,
}

impl RawSurface {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            skeleton_root_id: None,
            bounds: Bounds::default(),
            joint_ids: Vec::new(),
            joint_geometry_mins: Vec::new(),
            joint_geometry_maxs: Vec::new(),
            inverse_bind_matrices: Vec::new(),
            blend_channels: Vec::new(),
            discrete: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChannel {
    pub node_index: usize,
    #[serde(default)]
    pub translations: Vec<Vec3f>,
    #[serde(default)]
    pub rotations: Vec<Quatf>,
    #[serde(default)]
    pub scales: Vec<Vec3f>,
    /// Flattened `times × targets` morph weights.
    #[serde(default)]
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnimation {
    pub name: String,
    /// Seconds, first sample at 0.
    pub times: Vec<f32>,
    pub channels: Vec<RawChannel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CameraProjection {
    Perspective {
        aspect_ratio: f32,
        fov_degrees_x: f32,
        fov_degrees_y: f32,
        near_z: f32,
        far_z: f32,
    },
    Orthographic {
        mag_x: f32,
        mag_y: f32,
        near_z: f32,
        far_z: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCamera {
    pub name: String,
    pub node_id: i64,
    pub projection: CameraProjection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub is_joint: bool,
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub child_ids: Vec<i64>,
    pub translation: Vec3f,
    pub rotation: Quatf,
    pub scale: Vec3f,
    pub surface_id: Option<i64>,
    pub light_index: Option<usize>,
    #[serde(default)]
    pub user_properties: Vec<String>,
}

impl RawNode {
    pub fn new(id: i64, name: &str, parent_id: Option<i64>) -> Self {
        Self {
            is_joint: false,
            id,
            name: name.to_string(),
            parent_id,
            child_ids: Vec::new(),
            translation: vec3_zero(),
            rotation: quat_identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            surface_id: None,
            light_index: None,
            user_properties: Vec::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

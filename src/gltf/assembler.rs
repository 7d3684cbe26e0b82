//! Scene model to glTF document.
//!
//! One pass over a consolidated [`RawModel`]: nodes, animations, materials
//! (which pull in textures), one primitive per material sub-model, then
//! mesh/skin/camera/light attachment and the root scene. All accumulated
//! state lives in the [`GltfBuilder`] created for the call.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ::gltf::json as gltf_json;
use anyhow::{anyhow, Context, Result};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use gltf_json::animation::{Channel, Interpolation, Property, Sampler, Target};
use gltf_json::extensions::scene::khr_lights_punctual;
use gltf_json::mesh::{Mode, MorphTarget, Primitive, Semantic};
use gltf_json::validation::Checked;
use gltf_json::Index;
use serde_json::value::RawValue;

use super::buffer::GltfBuilder;
use super::compress::{self, StreamKind, EXT_MESHOPT_COMPRESSION};
use super::element::GltfElement;
use super::error::{ConvertError, WarningKind};
use super::glb;
use super::material::{build_material, user_properties_json, KHR_MATERIALS_UNLIT};
use super::options::{GltfOptions, UseLongIndices};
use super::texture::{ImageOutput, TextureBuilder};
use crate::math::{has_nan, quat_to_slice, vec3_to_slice, vec3_zero, Bounds, Vec3f, Vec4f};
use crate::raw::*;

pub const KHR_LIGHTS_PUNCTUAL: &str = "KHR_lights_punctual";
pub const DEFAULT_SCENE_NAME: &str = "Root Scene";
pub const DEFAULT_BUFFER_NAME: &str = "buffer.bin";

/// Cache-reordering kicks in from this compression level up.
const CACHE_OPTIMIZE_LEVEL: u32 = 7;

/// A finished conversion.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub json: String,
    pub binary: Vec<u8>,
    /// URI buffer 0 was given in the JSON: a sibling file name, a `data:`
    /// URI, or `None` when the blob travels in a GLB BIN chunk.
    pub buffer_uri: Option<String>,
}

impl ModelData {
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        glb::to_glb(&self.json, &self.binary)
    }

    /// Write a `.glb` when `path` has that extension, otherwise the JSON at
    /// `path` plus the blob beside it under `buffer_uri`.
    pub fn write(&self, path: &Path) -> Result<()> {
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("glb"))
        {
            return glb::write_glb(&self.json, &self.binary, path);
        }

        std::fs::write(path, &self.json).with_context(|| format!("Failed to write glTF: {}", path.display()))?;
        if let Some(uri) = self.buffer_uri.as_deref().filter(|uri| !uri.starts_with("data:")) {
            let bin_path = path.parent().unwrap_or_else(|| Path::new("")).join(uri);
            std::fs::write(&bin_path, &self.binary)
                .with_context(|| format!("Failed to write buffer: {}", bin_path.display()))?;
        }
        Ok(())
    }
}

/// Convert `raw` into a glTF document. `output_folder` receives copied
/// images when textures are neither embedded nor packed into the blob.
pub fn raw_to_gltf(raw: &RawModel, options: &GltfOptions, output_folder: &Path) -> Result<ModelData> {
    for (i, material) in raw.materials().iter().enumerate() {
        log::debug!(
            "Material {}: {} [shading: {}]",
            i,
            material.name,
            material.props.shading_model().describe()
        );
    }
    if raw.vertex_count() > 2 * raw.triangle_count() {
        log::debug!("High vertex count; consider dropping unused vertex attributes");
    }

    let material_models = raw.create_material_models(
        options.use_long_indices == UseLongIndices::Never,
        options.keep_attribs,
        true,
    );

    log::info!(
        "Building glTF: {} vertices, {} triangles, {} textures, {} nodes, {} surfaces, {} animations, {} cameras, {} lights",
        raw.vertex_count(),
        raw.triangle_count(),
        raw.textures().len(),
        raw.nodes().len(),
        material_models.len(),
        raw.animations().len(),
        raw.cameras().len(),
        raw.lights().len()
    );

    let compression = options.compression.enabled.then_some(options.compression);
    let mut gltf = GltfBuilder::new(compression);

    build_nodes(&mut gltf, raw, options)?;
    build_animations(&mut gltf, raw)?;

    let image_output = if options.output_binary {
        ImageOutput::Binary
    } else if options.embed_resources {
        ImageOutput::Embedded
    } else {
        ImageOutput::Folder
    };
    let mut textures = TextureBuilder::new(raw, image_output, output_folder);
    let materials = raw
        .materials()
        .iter()
        .map(|material| build_material(&mut gltf, &mut textures, material, options))
        .collect::<Result<Vec<_>>>()?;

    let meshes = build_meshes(&mut gltf, raw, &material_models, &materials, options)?;
    attach_meshes(&mut gltf, raw, &meshes)?;
    build_cameras(&mut gltf, raw)?;
    build_lights(&mut gltf, raw, options)?;

    let root_node = raw
        .node_index_by_id(raw.root_node())
        .ok_or(ConvertError::MissingNode(raw.root_node()))?;

    serialize(gltf, options, root_node)
}

// ============================================================================
// Nodes and animations
// ============================================================================

fn node_index(raw: &RawModel, node_id: i64) -> Result<Index<gltf_json::Node>, ConvertError> {
    raw.node_index_by_id(node_id)
        .map(|i| Index::new(i as u32))
        .ok_or(ConvertError::MissingNode(node_id))
}

fn extras_from(value: serde_json::Value) -> Result<gltf_json::Extras> {
    Ok(Some(RawValue::from_string(value.to_string())?))
}

/// One glTF node per scene-model node, same index.
fn build_nodes(gltf: &mut GltfBuilder, raw: &RawModel, options: &GltfOptions) -> Result<()> {
    for node in raw.nodes() {
        let children = node
            .child_ids
            .iter()
            .map(|&id| node_index(raw, id))
            .collect::<Result<Vec<_>, _>>()?;

        // any NaN component drops the whole property
        let translation = vec3_to_slice(&node.translation);
        let rotation = quat_to_slice(&node.rotation);
        let scale = vec3_to_slice(&node.scale);

        let extras = if options.enable_user_properties && !node.user_properties.is_empty() {
            extras_from(serde_json::json!({
                "userProperties": user_properties_json(&node.user_properties),
            }))?
        } else {
            None
        };

        gltf.nodes.push(gltf_json::Node {
            name: Some(node.name.clone()),
            children: (!children.is_empty()).then_some(children),
            translation: (!has_nan(&translation)).then_some(translation),
            rotation: (!has_nan(&rotation)).then_some(gltf_json::scene::UnitQuaternion(rotation)),
            scale: (!has_nan(&scale)).then_some(scale),
            extras,
            ..Default::default()
        });
    }
    Ok(())
}

fn build_animations(gltf: &mut GltfBuilder, raw: &RawModel) -> Result<()> {
    for animation in raw.animations() {
        if animation.channels.is_empty() || animation.times.is_empty() {
            gltf.warn(
                WarningKind::EmptyAnimation,
                format!("Animation '{}' has no channels or keyframes, skipping", animation.name),
            );
            continue;
        }

        let input = gltf.keyframe_accessor(&animation.times, "")?;
        let min = animation.times.iter().copied().fold(f32::INFINITY, f32::min);
        let max = animation.times.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        gltf.set_bounds(input, serde_json::json!([min]), serde_json::json!([max]));

        log::debug!("Animation '{}' has {} channels:", animation.name, animation.channels.len());

        let mut samplers = Vec::new();
        let mut channels = Vec::new();
        for (channel_index, channel) in animation.channels.iter().enumerate() {
            if channel.node_index >= raw.nodes().len() {
                return Err(anyhow!(
                    "Animation '{}' targets node index {} of {}",
                    animation.name,
                    channel.node_index,
                    raw.nodes().len()
                ));
            }
            log::debug!(
                "  Channel {} ({}) has translations/rotations/scales/weights: [{}, {}, {}, {}]",
                channel_index,
                raw.node(channel.node_index).name,
                channel.translations.len(),
                channel.rotations.len(),
                channel.scales.len(),
                channel.weights.len()
            );

            let mut outputs = Vec::new();
            if !channel.translations.is_empty() {
                outputs.push((gltf.keyframe_accessor(&channel.translations, "")?, Property::Translation));
            }
            if !channel.rotations.is_empty() {
                outputs.push((gltf.keyframe_accessor(&channel.rotations, "")?, Property::Rotation));
            }
            if !channel.scales.is_empty() {
                outputs.push((gltf.keyframe_accessor(&channel.scales, "")?, Property::Scale));
            }
            if !channel.weights.is_empty() {
                outputs.push((gltf.keyframe_accessor(&channel.weights, "")?, Property::MorphTargetWeights));
            }

            for (output, path) in outputs {
                samplers.push(Sampler {
                    input,
                    interpolation: Checked::Valid(Interpolation::Linear),
                    output,
                    extensions: None,
                    extras: None,
                });
                channels.push(Channel {
                    sampler: Index::new(samplers.len() as u32 - 1),
                    target: Target {
                        node: Index::new(channel.node_index as u32),
                        path: Checked::Valid(path),
                        extensions: None,
                        extras: None,
                    },
                    extensions: None,
                    extras: None,
                });
            }
        }

        gltf.animations.push(gltf_json::Animation {
            name: Some(animation.name.clone()),
            channels,
            samplers,
            extensions: None,
            extras: None,
        });
    }
    Ok(())
}

// ============================================================================
// Meshes
// ============================================================================

/// Build every sub-model's primitive, grouping primitives into one mesh per
/// surface id. Returns the surface id -> mesh map.
fn build_meshes(
    gltf: &mut GltfBuilder,
    raw: &RawModel,
    material_models: &[RawModel],
    materials: &[Index<gltf_json::Material>],
    options: &GltfOptions,
) -> Result<HashMap<i64, Index<gltf_json::Mesh>>> {
    let mut mesh_by_surface: HashMap<i64, Index<gltf_json::Mesh>> = HashMap::new();

    for model in material_models {
        let Some(first) = model.triangles().first() else {
            continue;
        };
        let surface = model.surface(first.surface_index);
        let sub_material = model.material(first.material_index);
        let material_index = raw
            .materials()
            .iter()
            .position(|m| m == sub_material)
            .ok_or_else(|| ConvertError::MissingMaterial(sub_material.name.clone()))?;

        let mesh = match mesh_by_surface.get(&surface.id) {
            Some(&mesh) => mesh,
            None => {
                let weights: Vec<f32> = surface.blend_channels.iter().map(|c| c.default_deform).collect();
                let extras = if surface.blend_channels.is_empty() {
                    None
                } else {
                    let names: Vec<&str> = surface.blend_channels.iter().map(|c| c.name.as_str()).collect();
                    extras_from(serde_json::json!({ "targetNames": names }))?
                };
                gltf.meshes.push(gltf_json::Mesh {
                    name: Some(surface.name.clone()),
                    primitives: Vec::new(),
                    weights: (!weights.is_empty()).then_some(weights),
                    extensions: None,
                    extras,
                });
                let mesh = Index::new(gltf.meshes.len() as u32 - 1);
                mesh_by_surface.insert(surface.id, mesh);
                mesh
            }
        };

        let primitive = build_primitive(gltf, model, surface, materials[material_index], options)?;
        gltf.meshes[mesh.value()].primitives.push(primitive);
    }

    log::debug!("Built {} meshes from {} material models", gltf.meshes.len(), material_models.len());
    Ok(mesh_by_surface)
}

fn build_primitive(
    gltf: &mut GltfBuilder,
    model: &RawModel,
    surface: &RawSurface,
    material: Index<gltf_json::Material>,
    options: &GltfOptions,
) -> Result<Primitive> {
    let vertex_count = model.vertex_count();
    let long_indices = match options.use_long_indices {
        UseLongIndices::Always => true,
        UseLongIndices::Auto => vertex_count > u16::MAX as usize,
        UseLongIndices::Never => false,
    };

    let mut indices: Vec<u32> = model
        .triangles()
        .iter()
        .flat_map(|t| t.verts.iter().map(|&v| v as u32))
        .collect();
    let transparent = model
        .triangles()
        .first()
        .is_some_and(|t| model.material(t.material_index).material_type.is_transparent());
    if let Some(compression) = gltf.compression() {
        if compression.level >= CACHE_OPTIMIZE_LEVEL && !transparent {
            indices = compress::optimize_for_cache(&indices, vertex_count);
        }
    }
    let index_accessor = gltf.index_accessor(&indices, long_indices, vertex_count, "")?;

    let attribs = model.vertex_attributes();
    let mut attributes = BTreeMap::new();
    let mut add = |semantic: Semantic, accessor: Index<gltf_json::Accessor>| {
        attributes.insert(Checked::Valid(semantic), accessor);
    };

    if attribs & ATTR_POSITION != 0 {
        let accessor = gltf.attribute_accessor(&model.attribute_array(|v| &v.position), StreamKind::Position, "")?;
        if let Some((min, max)) = surface.bounds.to_json_min_max() {
            gltf.set_bounds(accessor, min, max);
        }
        add(Semantic::Positions, accessor);
    }
    if attribs & ATTR_NORMAL != 0 {
        add(
            Semantic::Normals,
            gltf.attribute_accessor(&model.attribute_array(|v| &v.normal), StreamKind::Normal, "")?,
        );
    }
    if attribs & ATTR_TANGENT != 0 {
        add(
            Semantic::Tangents,
            gltf.attribute_accessor(&model.attribute_array(|v| &v.tangent), StreamKind::Normal, "")?,
        );
    }
    if attribs & ATTR_COLOR != 0 {
        add(
            Semantic::Colors(0),
            gltf.attribute_accessor(&model.attribute_array(|v| &v.color), StreamKind::Color, "")?,
        );
    }
    if attribs & ATTR_UV0 != 0 {
        add(
            Semantic::TexCoords(0),
            gltf.attribute_accessor(&model.attribute_array(|v| &v.uv0), StreamKind::TexCoord, "")?,
        );
    }
    if attribs & ATTR_UV1 != 0 {
        add(
            Semantic::TexCoords(1),
            gltf.attribute_accessor(&model.attribute_array(|v| &v.uv1), StreamKind::TexCoord, "")?,
        );
    }

    let blocks = model.global_weight_count().div_ceil(4);
    for block in 0..blocks {
        if attribs & ATTR_JOINT_INDICES != 0 {
            let joints: Vec<[u32; 4]> = model.array_attribute_array(|v| &v.joint_indices, block);
            add(
                Semantic::Joints(block as u32),
                gltf.attribute_accessor(&joints, StreamKind::Generic, "")?,
            );
        }
        if attribs & ATTR_JOINT_WEIGHTS != 0 {
            let weights: Vec<[f32; 4]> = model.array_attribute_array(|v| &v.joint_weights, block);
            add(
                Semantic::Weights(block as u32),
                gltf.attribute_accessor(&weights, StreamKind::Generic, "")?,
            );
        }
    }

    let mut targets = Vec::with_capacity(surface.blend_channels.len());
    for (channel_index, channel) in surface.blend_channels.iter().enumerate() {
        let blend = |v: &RawVertex| v.blends.get(channel_index).copied().unwrap_or_default();

        let positions: Vec<Vec3f> = model.vertices().iter().map(|v| blend(v).position).collect();
        let mut bounds = Bounds::default();
        positions.iter().for_each(|&p| bounds.add_point(p));
        let position_accessor = morph_accessor(gltf, &positions, vec3_zero(), StreamKind::Position, &channel.name, options)?;
        if let Some((min, max)) = bounds.to_json_min_max() {
            gltf.set_bounds(position_accessor, min, max);
        }

        let normals = if options.use_blend_shape_normals && channel.has_normals {
            let normals: Vec<Vec3f> = model.vertices().iter().map(|v| blend(v).normal).collect();
            Some(morph_accessor(gltf, &normals, vec3_zero(), StreamKind::Normal, &channel.name, options)?)
        } else {
            None
        };

        // morph TANGENT deltas are xyz only
        let tangents = if options.use_blend_shape_tangents && channel.has_tangents {
            let tangents: Vec<Vec3f> = model
                .vertices()
                .iter()
                .map(|v| {
                    let t: Vec4f = blend(v).tangent;
                    t.truncate()
                })
                .collect();
            Some(morph_accessor(gltf, &tangents, vec3_zero(), StreamKind::Normal, &channel.name, options)?)
        } else {
            None
        };

        targets.push(MorphTarget {
            positions: Some(position_accessor),
            normals,
            tangents,
        });
    }

    Ok(Primitive {
        attributes,
        indices: Some(index_accessor),
        material: Some(material),
        mode: Checked::Valid(Mode::Triangles),
        targets: (!targets.is_empty()).then_some(targets),
        extensions: None,
        extras: None,
    })
}

/// Morph-target delta stream: sparse over zeros when that was asked for and
/// comes out smaller, dense otherwise.
fn morph_accessor<T: GltfElement + PartialEq + Copy>(
    gltf: &mut GltfBuilder,
    values: &[T],
    zero: T,
    kind: StreamKind,
    name: &str,
    options: &GltfOptions,
) -> Result<Index<gltf_json::Accessor>> {
    if options.use_sparse_blend_shapes {
        let changed = values.iter().filter(|&&v| v != zero).count();
        if GltfBuilder::sparse_is_beneficial(changed, values.len(), T::GL_TYPE.byte_size()?) {
            let base = vec![zero; values.len()];
            return gltf.sparse_accessor(None, &base, values, name);
        }
    }
    gltf.attribute_accessor(values, kind, name)
}

/// Put each surface's mesh, and skin if it has joints, on the nodes that
/// reference it.
fn attach_meshes(
    gltf: &mut GltfBuilder,
    raw: &RawModel,
    meshes: &HashMap<i64, Index<gltf_json::Mesh>>,
) -> Result<()> {
    for (i, node) in raw.nodes().iter().enumerate() {
        let Some(surface_id) = node.surface_id else {
            continue;
        };
        let surface_index = raw
            .surface_index_by_id(surface_id)
            .ok_or(ConvertError::MissingSurface(surface_id))?;
        let surface = raw.surface(surface_index);

        let Some(&mesh) = meshes.get(&surface.id) else {
            log::debug!("Surface '{}' has no triangles, node '{}' gets no mesh", surface.name, node.name);
            continue;
        };
        if node.is_joint {
            return Err(ConvertError::JointAttachment {
                node: node.name.clone(),
                what: "mesh",
            }
            .into());
        }
        gltf.nodes[i].mesh = Some(mesh);

        if surface.joint_ids.is_empty() || gltf.nodes[i].skin.is_some() {
            continue;
        }
        let joints = surface
            .joint_ids
            .iter()
            .map(|&id| node_index(raw, id))
            .collect::<Result<Vec<_>, _>>()?;
        let skeleton = surface
            .skeleton_root_id
            .map(|id| node_index(raw, id))
            .transpose()?;
        let inverse_bind_matrices = gltf.accessor_and_view(&surface.inverse_bind_matrices, None, "")?;

        gltf.skins.push(gltf_json::Skin {
            name: Some(surface.name.clone()),
            inverse_bind_matrices: Some(inverse_bind_matrices),
            joints,
            skeleton,
            extensions: None,
            extras: None,
        });
        gltf.nodes[i].skin = Some(Index::new(gltf.skins.len() as u32 - 1));
    }
    Ok(())
}

// ============================================================================
// Cameras and lights
// ============================================================================

fn build_cameras(gltf: &mut GltfBuilder, raw: &RawModel) -> Result<()> {
    for camera in raw.cameras() {
        let (type_, perspective, orthographic) = match camera.projection {
            CameraProjection::Perspective {
                aspect_ratio,
                fov_degrees_y,
                near_z,
                far_z,
                ..
            } => (
                gltf_json::camera::Type::Perspective,
                Some(gltf_json::camera::Perspective {
                    aspect_ratio: Some(aspect_ratio),
                    yfov: fov_degrees_y.to_radians(),
                    zfar: Some(far_z),
                    znear: near_z,
                    extensions: None,
                    extras: None,
                }),
                None,
            ),
            CameraProjection::Orthographic {
                mag_x,
                mag_y,
                near_z,
                far_z,
            } => (
                gltf_json::camera::Type::Orthographic,
                None,
                Some(gltf_json::camera::Orthographic {
                    xmag: mag_x,
                    ymag: mag_y,
                    zfar: far_z,
                    znear: near_z,
                    extensions: None,
                    extras: None,
                }),
            ),
        };

        gltf.cameras.push(gltf_json::Camera {
            name: Some(camera.name.clone()),
            orthographic,
            perspective,
            type_: Checked::Valid(type_),
            extensions: None,
            extras: None,
        });
        let index = Index::new(gltf.cameras.len() as u32 - 1);

        let Some(node) = raw.node_index_by_id(camera.node_id) else {
            gltf.warn(
                WarningKind::MissingCameraNode,
                format!("Camera node id {} does not exist", camera.node_id),
            );
            continue;
        };
        if raw.node(node).is_joint {
            return Err(ConvertError::JointAttachment {
                node: raw.node(node).name.clone(),
                what: "camera",
            }
            .into());
        }
        gltf.nodes[node].camera = Some(index);
    }
    Ok(())
}

fn build_lights(gltf: &mut GltfBuilder, raw: &RawModel, options: &GltfOptions) -> Result<()> {
    if !options.use_khr_lights_punctual {
        return Ok(());
    }

    for light in raw.lights() {
        let (type_, spot) = match light.light_type {
            RawLightType::Directional => (khr_lights_punctual::Type::Directional, None),
            RawLightType::Point => (khr_lights_punctual::Type::Point, None),
            RawLightType::Spot => (
                khr_lights_punctual::Type::Spot,
                Some(khr_lights_punctual::Spot {
                    inner_cone_angle: light.inner_cone_angle,
                    outer_cone_angle: light.outer_cone_angle,
                }),
            ),
        };
        gltf.lights.push(khr_lights_punctual::Light {
            color: vec3_to_slice(&light.color),
            // source intensity is 100-based
            intensity: light.intensity / 100.0,
            name: Some(light.name.clone()),
            type_: Checked::Valid(type_),
            range: None,
            spot,
            extensions: None,
            extras: Default::default(),
        });
    }

    for (i, node) in raw.nodes().iter().enumerate() {
        let Some(light) = node.light_index else {
            continue;
        };
        if light >= gltf.lights.len() {
            return Err(anyhow!("Node '{}' references light {} of {}", node.name, light, gltf.lights.len()));
        }
        if node.is_joint {
            return Err(ConvertError::JointAttachment {
                node: node.name.clone(),
                what: "light",
            }
            .into());
        }
        gltf.nodes[i].extensions = Some(gltf_json::extensions::scene::Node {
            khr_lights_punctual: Some(khr_lights_punctual::KhrLightsPunctual {
                light: Index::new(light as u32),
            }),
            ..Default::default()
        });
    }
    Ok(())
}

// ============================================================================
// Serialization
// ============================================================================

fn serialize(mut gltf: GltfBuilder, options: &GltfOptions, root_node: usize) -> Result<ModelData> {
    gltf.finish_buffers();

    let buffer_uri = if gltf.binary.is_empty() {
        // nothing references an empty blob, and glTF forbids zero-length buffers
        gltf.buffers.clear();
        None
    } else if options.output_binary {
        None
    } else if options.embed_resources {
        Some(format!(
            "data:application/octet-stream;base64,{}",
            BASE64_STANDARD.encode(&gltf.binary)
        ))
    } else {
        Some(DEFAULT_BUFFER_NAME.to_string())
    };
    if let Some(buffer) = gltf.buffers.first_mut() {
        buffer.uri = buffer_uri.clone();
    }

    let mut extensions_used = Vec::new();
    let mut extensions_required = Vec::new();
    if gltf
        .materials
        .iter()
        .any(|m| m.extensions.as_ref().is_some_and(|e| e.unlit.is_some()))
    {
        extensions_used.push(KHR_MATERIALS_UNLIT.to_string());
    }
    if !gltf.lights.is_empty() {
        extensions_used.push(KHR_LIGHTS_PUNCTUAL.to_string());
    }
    if gltf.uses_compression() {
        extensions_used.push(EXT_MESHOPT_COMPRESSION.to_string());
        extensions_required.push(EXT_MESHOPT_COMPRESSION.to_string());
    }

    let extensions = (!gltf.lights.is_empty()).then(|| gltf_json::extensions::root::Root {
        khr_lights_punctual: Some(gltf_json::extensions::root::KhrLightsPunctual {
            lights: std::mem::take(&mut gltf.lights),
        }),
        ..Default::default()
    });

    let root = gltf_json::Root {
        asset: gltf_json::Asset {
            version: "2.0".to_string(),
            generator: Some(format!("raw2gltf {}", env!("CARGO_PKG_VERSION"))),
            ..Default::default()
        },
        nodes: gltf.nodes,
        scenes: vec![gltf_json::Scene {
            nodes: vec![Index::new(root_node as u32)],
            name: Some(DEFAULT_SCENE_NAME.to_string()),
            extensions: None,
            extras: None,
        }],
        scene: Some(Index::new(0)),
        accessors: gltf.accessors,
        buffers: gltf.buffers,
        buffer_views: gltf.buffer_views,
        meshes: gltf.meshes,
        materials: gltf.materials,
        images: gltf.images,
        samplers: gltf.samplers,
        textures: gltf.textures,
        skins: gltf.skins,
        animations: gltf.animations,
        cameras: gltf.cameras,
        extensions_used,
        extensions_required,
        extensions,
        ..Default::default()
    };

    let json = if options.output_binary {
        serde_json::to_string(&root)?
    } else {
        serde_json::to_string_pretty(&root)?
    };
    log::info!(
        "glTF document: {} bytes of JSON, {} bytes of binary",
        json.len(),
        gltf.binary.len()
    );

    Ok(ModelData {
        json,
        binary: gltf.binary,
        buffer_uri,
    })
}

// ============================================================================
// Tests
// ============================================================================

//! Scene-model materials to glTF metallic-roughness (or unlit) materials.

use ::gltf::json as gltf_json;
use anyhow::Result;
use gltf_json::material::{
    AlphaMode, EmissiveFactor, NormalTexture, OcclusionTexture, PbrBaseColorFactor, PbrMetallicRoughness,
    StrengthFactor,
};
use gltf_json::validation::Checked;
use gltf_json::Index;
use serde_json::value::RawValue;

use super::buffer::GltfBuilder;
use super::options::GltfOptions;
use super::texture::TextureBuilder;
use crate::math::{clamp_unit, clamp_unit3, clamp_unit4, Vec3f, Vec4f};
use crate::raw::{RawMatProps, RawMaterial, ShadingModel, TextureUsage};

pub const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";

/// Metallic factor assumed for Blinn and Phong surfaces.
const BLINN_PHONG_METALLIC: f32 = 0.4;
const DEFAULT_METALLIC: f32 = 0.2;
const DEFAULT_ROUGHNESS: f32 = 0.8;

/// Shininess to roughness: 0 -> 1, 2 -> ~0.7, 6 -> 0.5, 16 -> ~0.33, and
/// towards 0 as shininess grows.
pub fn shininess_to_roughness(shininess: f32) -> f32 {
    (2.0 / (2.0 + shininess.max(0.0))).sqrt()
}

fn texture_info(index: Index<gltf_json::Texture>) -> gltf_json::texture::Info {
    gltf_json::texture::Info {
        index,
        tex_coord: 0,
        extensions: None,
        extras: None,
    }
}

fn slot_texture(
    gltf: &mut GltfBuilder,
    textures: &mut TextureBuilder<'_>,
    material: &RawMaterial,
    usage: TextureUsage,
) -> Option<Index<gltf_json::Texture>> {
    material
        .textures
        .get(usage)
        .and_then(|t| textures.simple(gltf, t, "simple"))
}

/// Resolved factor and texture choice, before it becomes JSON.
struct Resolved {
    base_color_factor: Vec4f,
    base_color_texture: Option<Index<gltf_json::Texture>>,
    metallic: f32,
    roughness: f32,
    met_rough_texture: Option<Index<gltf_json::Texture>>,
    occlusion_texture: Option<Index<gltf_json::Texture>>,
    normal_texture: Option<Index<gltf_json::Texture>>,
    emissive_texture: Option<Index<gltf_json::Texture>>,
    emissive_factor: Vec3f,
    unlit: bool,
}

/// Emit the glTF material for `material`, building whatever textures it
/// needs along the way.
pub fn build_material(
    gltf: &mut GltfBuilder,
    textures: &mut TextureBuilder<'_>,
    material: &RawMaterial,
    options: &GltfOptions,
) -> Result<Index<gltf_json::Material>> {
    let mut resolved = Resolved {
        base_color_factor: material.props.diffuse_factor(),
        base_color_texture: None,
        metallic: 1.0,
        roughness: 1.0,
        met_rough_texture: None,
        occlusion_texture: None,
        normal_texture: None,
        emissive_texture: None,
        emissive_factor: match &material.props {
            RawMatProps::Traditional(p) => p.emissive_factor,
            RawMatProps::MetRough(p) => p.emissive_factor * p.emissive_intensity,
        },
        unlit: false,
    };

    if options.use_khr_mat_unlit {
        resolved.base_color_texture = match material.props {
            RawMatProps::MetRough(_) => slot_texture(gltf, textures, material, TextureUsage::Albedo),
            RawMatProps::Traditional(_) => slot_texture(gltf, textures, material, TextureUsage::Diffuse),
        };
        resolved.metallic = 0.0;
        resolved.roughness = 1.0;
        resolved.emissive_factor = Vec3f::new(0.0, 0.0, 0.0);
        resolved.unlit = true;
    } else if options.use_pbr_met_rough {
        match &material.props {
            RawMatProps::MetRough(props) => {
                let invert = props.invert_roughness_map;
                // an absent map is written as 1.0 so the factor alone decides the channel
                let has_metallic = material.textures.get(TextureUsage::Metallic).is_some();
                let has_roughness = material.textures.get(TextureUsage::Roughness).is_some();
                let merge = move |px: &[[f32; 4]]| {
                    let metallic = if has_metallic { px[1][0] } else { 1.0 };
                    let roughness = match (has_roughness, invert) {
                        (false, _) => 1.0,
                        (true, true) => 1.0 - px[2][0],
                        (true, false) => px[2][0],
                    };
                    [px[0][0], roughness, metallic, 1.0]
                };
                let packed = textures.combine(
                    gltf,
                    &[
                        material.textures.get(TextureUsage::Occlusion),
                        material.textures.get(TextureUsage::Metallic),
                        material.textures.get(TextureUsage::Roughness),
                    ],
                    "ao_met_rough",
                    &merge,
                    false,
                );
                resolved.met_rough_texture = packed;
                if material.textures.get(TextureUsage::Occlusion).is_some() {
                    resolved.occlusion_texture = packed;
                }
                resolved.base_color_texture = slot_texture(gltf, textures, material, TextureUsage::Albedo);
                resolved.metallic = props.metallic;
                resolved.roughness = props.roughness;
            }
            RawMatProps::Traditional(props) => {
                match props.shading_model {
                    ShadingModel::Blinn | ShadingModel::Phong => {
                        let shininess = props.shininess;
                        // the shininess map scales the factor, not the other way round
                        let merge = move |px: &[[f32; 4]]| {
                            [0.0, shininess_to_roughness(shininess * px[0][0]), BLINN_PHONG_METALLIC, 1.0]
                        };
                        let packed = textures.combine(
                            gltf,
                            &[material.textures.get(TextureUsage::Shininess)],
                            "ao_met_rough",
                            &merge,
                            false,
                        );
                        resolved.met_rough_texture = packed;
                        if packed.is_some() {
                            // the texture carries the values; factors become identity
                            resolved.metallic = 1.0;
                            resolved.roughness = 1.0;
                        } else {
                            resolved.metallic = BLINN_PHONG_METALLIC;
                            resolved.roughness = shininess_to_roughness(shininess);
                        }
                    }
                    _ => {
                        resolved.metallic = DEFAULT_METALLIC;
                        resolved.roughness = DEFAULT_ROUGHNESS;
                    }
                }
                resolved.base_color_texture = slot_texture(gltf, textures, material, TextureUsage::Diffuse);
            }
        }
    } else {
        resolved.base_color_texture = match material.props {
            RawMatProps::MetRough(_) => slot_texture(gltf, textures, material, TextureUsage::Albedo),
            RawMatProps::Traditional(_) => slot_texture(gltf, textures, material, TextureUsage::Diffuse),
        };
    }

    if !resolved.unlit {
        resolved.normal_texture = slot_texture(gltf, textures, material, TextureUsage::Normal);
        resolved.emissive_texture = slot_texture(gltf, textures, material, TextureUsage::Emissive);
        if resolved.occlusion_texture.is_none() {
            resolved.occlusion_texture = slot_texture(gltf, textures, material, TextureUsage::Occlusion);
        }
    }

    let pbr = if options.use_pbr_met_rough || resolved.unlit {
        PbrMetallicRoughness {
            base_color_factor: PbrBaseColorFactor(clamp_unit4(resolved.base_color_factor)),
            base_color_texture: resolved.base_color_texture.map(texture_info),
            metallic_factor: StrengthFactor(clamp_unit(resolved.metallic)),
            roughness_factor: StrengthFactor(clamp_unit(resolved.roughness)),
            metallic_roughness_texture: resolved.met_rough_texture.map(texture_info),
            extensions: None,
            extras: None,
        }
    } else {
        PbrMetallicRoughness {
            base_color_factor: PbrBaseColorFactor(clamp_unit4(resolved.base_color_factor)),
            base_color_texture: resolved.base_color_texture.map(texture_info),
            ..Default::default()
        }
    };

    let mut extras = serde_json::json!({
        "shadingModel": material.props.shading_model().describe(),
        "isTruePBR": matches!(material.props, RawMatProps::MetRough(_)),
    });
    if options.enable_user_properties && !material.user_properties.is_empty() {
        extras["userProperties"] = user_properties_json(&material.user_properties);
    }

    let alpha_mode = if material.material_type.is_transparent() {
        AlphaMode::Blend
    } else {
        AlphaMode::Opaque
    };

    gltf.materials.push(gltf_json::Material {
        alpha_cutoff: None,
        alpha_mode: Checked::Valid(alpha_mode),
        double_sided: false,
        pbr_metallic_roughness: pbr,
        normal_texture: resolved.normal_texture.map(|index| NormalTexture {
            index,
            scale: 1.0,
            tex_coord: 0,
            extensions: None,
            extras: None,
        }),
        occlusion_texture: resolved.occlusion_texture.map(|index| OcclusionTexture {
            index,
            strength: StrengthFactor(1.0),
            tex_coord: 0,
            extensions: None,
            extras: None,
        }),
        emissive_texture: resolved.emissive_texture.map(texture_info),
        emissive_factor: EmissiveFactor(clamp_unit3(resolved.emissive_factor)),
        extensions: resolved.unlit.then(|| gltf_json::extensions::material::Material {
            unlit: Some(Default::default()),
            ..Default::default()
        }),
        extras: Some(RawValue::from_string(extras.to_string())?),
        name: Some(material.name.clone()),
    });

    log::debug!(
        "Material '{}': {}{}",
        material.name,
        material.props.shading_model().describe(),
        if resolved.unlit { " (unlit)" } else { "" }
    );
    Ok(Index::new(gltf.materials.len() as u32 - 1))
}

/// User properties arrive as JSON object strings; anything unparsable is
/// kept verbatim.
pub fn user_properties_json(properties: &[String]) -> serde_json::Value {
    serde_json::Value::Array(
        properties
            .iter()
            .map(|p| serde_json::from_str(p).unwrap_or_else(|_| serde_json::Value::String(p.clone())))
            .collect(),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::texture::ImageOutput;
    use crate::image_utils::{self, EncodeFormat};
    use crate::raw::{
        MetRoughProps, RawMaterialType, RawModel, RawTexture, TextureOcclusion, TextureSlots, TraditionalProps,
    };
    use cgmath::{Vector3, Vector4};
    use std::path::Path;
    use tempfile::TempDir;

    fn traditional(model: ShadingModel, shininess: f32, textures: TextureSlots) -> RawMaterial {
        RawMaterial {
            id: 0,
            name: "mat".into(),
            material_type: RawMaterialType::Opaque,
            props: RawMatProps::Traditional(TraditionalProps {
                shading_model: model,
                ambient_factor: Vector3::new(0.0, 0.0, 0.0),
                diffuse_factor: Vector4::new(0.5, 0.5, 0.5, 1.0),
                emissive_factor: Vector3::new(0.0, 0.0, 0.0),
                specular_factor: Vector3::new(0.0, 0.0, 0.0),
                shininess,
            }),
            textures,
            user_properties: vec![],
        }
    }

    fn pbr(textures: TextureSlots) -> RawMaterial {
        RawMaterial {
            id: 0,
            name: "pbr".into(),
            material_type: RawMaterialType::Transparent,
            props: RawMatProps::MetRough(MetRoughProps {
                diffuse_factor: Vector4::new(1.0, 0.0, 0.0, 0.5),
                emissive_factor: Vector3::new(1.0, 0.5, 0.0),
                emissive_intensity: 0.5,
                metallic: 0.3,
                roughness: 0.6,
                invert_roughness_map: false,
            }),
            textures,
            user_properties: vec![r#"{"k": 1}"#.into()],
        }
    }

    fn grey_texture(model: &mut RawModel, dir: &Path, name: &str, usage: TextureUsage) -> usize {
        let path = dir.join(format!("{name}.png"));
        let bytes = image_utils::encode(EncodeFormat::Png, 2, 2, 4, &[128u8; 16]).unwrap();
        std::fs::write(&path, bytes).unwrap();
        model.add_texture_record(RawTexture {
            name: name.into(),
            width: 2,
            height: 2,
            mip_levels: 1,
            usage,
            occlusion: TextureOcclusion::Opaque,
            file_name: format!("{name}.png"),
            file_location: path.to_string_lossy().to_string(),
        })
    }

    fn build(material: &RawMaterial, model: &RawModel, options: &GltfOptions, dir: &Path) -> (GltfBuilder, gltf_json::Material) {
        let mut gltf = GltfBuilder::new(None);
        let mut textures = TextureBuilder::new(model, ImageOutput::Binary, dir);
        let index = build_material(&mut gltf, &mut textures, material, options).unwrap();
        let out = gltf.materials[index.value()].clone();
        (gltf, out)
    }

    #[test]
    fn roughness_curve() {
        assert_eq!(shininess_to_roughness(0.0), 1.0);
        assert!((shininess_to_roughness(6.0) - 0.5).abs() < 1e-6);
        assert!(shininess_to_roughness(1000.0) < 0.05);
    }

    #[test]
    fn lambert_gets_constants() {
        let tmp = TempDir::new().unwrap();
        let model = RawModel::new();
        let (_, mat) = build(&traditional(ShadingModel::Lambert, 0.0, TextureSlots::default()), &model, &GltfOptions::default(), tmp.path());
        assert_eq!(mat.pbr_metallic_roughness.metallic_factor.0, DEFAULT_METALLIC);
        assert_eq!(mat.pbr_metallic_roughness.roughness_factor.0, DEFAULT_ROUGHNESS);
        assert_eq!(mat.alpha_mode, Checked::Valid(AlphaMode::Opaque));
    }

    #[test]
    fn phong_without_map_derives_roughness() {
        let tmp = TempDir::new().unwrap();
        let model = RawModel::new();
        let (_, mat) = build(&traditional(ShadingModel::Phong, 6.0, TextureSlots::default()), &model, &GltfOptions::default(), tmp.path());
        assert_eq!(mat.pbr_metallic_roughness.metallic_factor.0, BLINN_PHONG_METALLIC);
        assert!((mat.pbr_metallic_roughness.roughness_factor.0 - 0.5).abs() < 1e-6);
        assert!(mat.pbr_metallic_roughness.metallic_roughness_texture.is_none());
    }

    #[test]
    fn phong_with_shininess_map_packs_texture() {
        let tmp = TempDir::new().unwrap();
        let mut model = RawModel::new();
        let shiny = grey_texture(&mut model, tmp.path(), "shiny", TextureUsage::Shininess);
        let (gltf, mat) = build(
            &traditional(ShadingModel::Blinn, 10.0, TextureSlots::default().with(TextureUsage::Shininess, shiny)),
            &model,
            &GltfOptions::default(),
            tmp.path(),
        );
        assert!(mat.pbr_metallic_roughness.metallic_roughness_texture.is_some());
        assert_eq!(mat.pbr_metallic_roughness.metallic_factor.0, 1.0);
        assert_eq!(mat.pbr_metallic_roughness.roughness_factor.0, 1.0);
        assert_eq!(gltf.images[0].mime_type.as_ref().unwrap().0, "image/jpeg");
    }

    #[test]
    fn pbr_packs_occlusion_metallic_roughness() {
        let tmp = TempDir::new().unwrap();
        let mut model = RawModel::new();
        let occ = grey_texture(&mut model, tmp.path(), "occ", TextureUsage::Occlusion);
        let rough = grey_texture(&mut model, tmp.path(), "rough", TextureUsage::Roughness);
        let slots = TextureSlots::default()
            .with(TextureUsage::Occlusion, occ)
            .with(TextureUsage::Roughness, rough);
        let (_, mat) = build(&pbr(slots), &model, &GltfOptions::default(), tmp.path());

        let packed = mat.pbr_metallic_roughness.metallic_roughness_texture.as_ref().unwrap().index;
        assert_eq!(mat.occlusion_texture.as_ref().unwrap().index, packed);
        assert_eq!(mat.alpha_mode, Checked::Valid(AlphaMode::Blend));
        assert_eq!(mat.emissive_factor.0, [0.5, 0.25, 0.0]);
        assert_eq!(mat.pbr_metallic_roughness.metallic_factor.0, 0.3);
        assert_eq!(mat.pbr_metallic_roughness.roughness_factor.0, 0.6);
    }

    #[test]
    fn pbr_factors_survive_occlusion_only() {
        let tmp = TempDir::new().unwrap();
        let mut model = RawModel::new();
        let occ = grey_texture(&mut model, tmp.path(), "occ", TextureUsage::Occlusion);
        let (_, mat) = build(&pbr(TextureSlots::default().with(TextureUsage::Occlusion, occ)), &model, &GltfOptions::default(), tmp.path());

        assert!(mat.pbr_metallic_roughness.metallic_roughness_texture.is_some());
        assert_eq!(mat.pbr_metallic_roughness.metallic_factor.0, 0.3);
        assert_eq!(mat.pbr_metallic_roughness.roughness_factor.0, 0.6);
    }

    #[test]
    fn unlit_drops_lighting_inputs() {
        let tmp = TempDir::new().unwrap();
        let mut model = RawModel::new();
        let normal = grey_texture(&mut model, tmp.path(), "nrm", TextureUsage::Normal);
        let occ = grey_texture(&mut model, tmp.path(), "occ", TextureUsage::Occlusion);
        let slots = TextureSlots::default()
            .with(TextureUsage::Normal, normal)
            .with(TextureUsage::Occlusion, occ);
        let options = GltfOptions {
            use_khr_mat_unlit: true,
            ..Default::default()
        };
        let (gltf, mat) = build(&pbr(slots), &model, &options, tmp.path());
        assert!(gltf.textures.is_empty());
        assert!(mat.normal_texture.is_none());
        assert!(mat.occlusion_texture.is_none());
        assert!(mat.emissive_texture.is_none());
        assert_eq!(mat.emissive_factor.0, [0.0, 0.0, 0.0]);
        assert_eq!(mat.pbr_metallic_roughness.metallic_factor.0, 0.0);
        assert_eq!(mat.pbr_metallic_roughness.roughness_factor.0, 1.0);
        assert!(mat.extensions.as_ref().unwrap().unlit.is_some());
    }

    #[test]
    fn extras_describe_the_source() {
        let tmp = TempDir::new().unwrap();
        let model = RawModel::new();
        let options = GltfOptions {
            enable_user_properties: true,
            ..Default::default()
        };
        let (_, mat) = build(&pbr(TextureSlots::default()), &model, &options, tmp.path());
        let extras: serde_json::Value = serde_json::from_str(mat.extras.as_ref().unwrap().get()).unwrap();
        assert_eq!(extras["shadingModel"], "Metallic/Roughness");
        assert_eq!(extras["isTruePBR"], true);
        assert_eq!(extras["userProperties"][0]["k"], 1);
    }
}

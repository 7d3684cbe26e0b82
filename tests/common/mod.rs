// Common scene-model fixtures for the integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use cgmath::{Vector2, Vector3, Vector4};
use raw2gltf_lib::image_utils::{self, EncodeFormat};
use raw2gltf_lib::raw::*;

pub fn lambert(name: &str) -> RawMaterial {
    RawMaterial {
        id: 0,
        name: name.to_string(),
        material_type: RawMaterialType::Opaque,
        props: RawMatProps::Traditional(TraditionalProps {
            shading_model: ShadingModel::Lambert,
            ambient_factor: Vector3::new(0.0, 0.0, 0.0),
            diffuse_factor: Vector4::new(0.8, 0.8, 0.8, 1.0),
            emissive_factor: Vector3::new(0.0, 0.0, 0.0),
            specular_factor: Vector3::new(0.0, 0.0, 0.0),
            shininess: 0.0,
        }),
        textures: TextureSlots::default(),
        user_properties: vec![],
    }
}

pub fn pbr(name: &str, textures: TextureSlots) -> RawMaterial {
    RawMaterial {
        id: 0,
        name: name.to_string(),
        material_type: RawMaterialType::Opaque,
        props: RawMatProps::MetRough(MetRoughProps {
            diffuse_factor: Vector4::new(1.0, 1.0, 1.0, 1.0),
            emissive_factor: Vector3::new(0.0, 0.0, 0.0),
            emissive_intensity: 1.0,
            metallic: 0.5,
            roughness: 0.5,
            invert_roughness_map: false,
        }),
        textures,
        user_properties: vec![],
    }
}

/// Root node 1 holding node 2, which references surface 100.
pub fn scene_shell(raw: &mut RawModel, surface_name: &str) -> usize {
    raw.add_node_by_id(1, "root", None);
    raw.add_node_by_id(2, surface_name, Some(1));
    raw.node_mut(0).child_ids.push(2);
    raw.node_mut(1).surface_id = Some(100);
    raw.set_root_node(1);
    raw.add_surface_by_id(surface_name, 100)
}

const CUBE_CORNERS: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

const CUBE_FACES: [[usize; 4]; 6] = [
    [0, 3, 2, 1],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [2, 3, 7, 6],
    [1, 2, 6, 5],
    [0, 4, 7, 3],
];

/// A cube whose bottom three faces use material "red" and top three
/// "blue". Normals are left for `transform_geometry` to fill in.
pub fn cube_two_materials() -> RawModel {
    let mut raw = RawModel::new();
    let surface = scene_shell(&mut raw, "cube");
    raw.add_vertex_attribute(ATTR_POSITION | ATTR_UV0);
    let red = raw.add_material(lambert("red"));
    let blue = raw.add_material(lambert("blue"));

    for (face_index, face) in CUBE_FACES.iter().enumerate() {
        let material = if face_index < 3 { red } else { blue };
        let corners: Vec<usize> = face
            .iter()
            .enumerate()
            .map(|(k, &c)| {
                let [x, y, z] = CUBE_CORNERS[c];
                // one UV island per face keeps corners from merging across faces
                raw.add_vertex(RawVertex {
                    uv0: Vector2::new((face_index * 2 + k % 2) as f32 / 12.0, (k / 2) as f32),
                    ..RawVertex::at(x, y, z)
                })
            })
            .collect();
        raw.add_triangle(corners[0], corners[1], corners[2], material, surface);
        raw.add_triangle(corners[0], corners[2], corners[3], material, surface);
    }
    for corner in CUBE_CORNERS {
        raw.surface_mut(surface)
            .bounds
            .add_point(Vector3::new(corner[0], corner[1], corner[2]));
    }
    raw
}

/// One material, `triangles` disjoint triangles, every vertex unique.
pub fn triangle_soup(triangles: usize) -> RawModel {
    let mut raw = RawModel::new();
    let surface = scene_shell(&mut raw, "soup");
    raw.add_vertex_attribute(ATTR_POSITION);
    let material = raw.add_material(lambert("soup"));
    for t in 0..triangles {
        let base = (t * 3) as f32;
        let a = raw.add_vertex(RawVertex::at(base, 0.0, 0.0));
        let b = raw.add_vertex(RawVertex::at(base + 1.0, 0.0, 0.0));
        let c = raw.add_vertex(RawVertex::at(base + 2.0, 1.0, 0.0));
        raw.add_triangle(a, b, c, material, surface);
    }
    raw
}

/// Write a `size`x`size` RGBA PNG filled with `rgba` and return its path.
pub fn write_png(dir: &Path, name: &str, size: u32, rgba: [u8; 4]) -> PathBuf {
    let pixels: Vec<u8> = (0..size * size).flat_map(|_| rgba).collect();
    let bytes = image_utils::encode(EncodeFormat::Png, size, size, 4, &pixels).expect("encode fixture png");
    let path = dir.join(format!("{name}.png"));
    std::fs::write(&path, bytes).expect("write fixture png");
    path
}

/// Register an on-disk texture with the model.
pub fn add_file_texture(raw: &mut RawModel, path: &Path, usage: TextureUsage) -> usize {
    let name = path.file_stem().unwrap().to_string_lossy().to_string();
    let file_name = path.file_name().unwrap().to_string_lossy().to_string();
    raw.add_texture(&name, &file_name, &path.to_string_lossy(), usage)
        .expect("texture registered")
}

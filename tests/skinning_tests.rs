// Integration tests for skin weights through condense and export
// These tests verify weight ordering, truncation and the JOINTS/WEIGHTS blocks

use cgmath::{Matrix4, Vector3};
use raw2gltf_lib::gltf::{raw_to_gltf, GltfOptions};
use raw2gltf_lib::raw::*;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

fn skinned_triangle(weights: &[(u32, f32)]) -> RawModel {
    let mut raw = RawModel::new();
    let surface = common::scene_shell(&mut raw, "skinned");
    for (id, name) in [(10, "hip"), (11, "knee")] {
        raw.add_node_by_id(id, name, Some(1));
        raw.node_mut(0).child_ids.push(id);
        let index = raw.node_index_by_id(id).unwrap();
        raw.node_mut(index).is_joint = true;
    }
    {
        let s = raw.surface_mut(surface);
        s.joint_ids = vec![10, 11];
        s.skeleton_root_id = Some(10);
        s.inverse_bind_matrices = vec![Matrix4::from_scale(1.0), Matrix4::from_translation(Vector3::new(0.0, -1.0, 0.0))];
    }

    raw.add_vertex_attribute(ATTR_POSITION);
    let material = raw.add_material(common::lambert("skin"));
    let corners: Vec<usize> = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]
        .iter()
        .map(|&(x, y)| {
            let mut v = RawVertex::at(x, y, 0.0);
            v.skinning_info = weights
                .iter()
                .map(|&(joint_index, joint_weight)| SkinningInfo { joint_index, joint_weight })
                .collect();
            raw.add_vertex(v)
        })
        .collect();
    raw.add_triangle(corners[0], corners[1], corners[2], material, surface);
    raw
}

/// Weights are sorted, truncated and normalized into 4-wide blocks
#[test]
fn condense_packs_weights_into_blocks() {
    println!("\n🔍 Testing: Weight condensing");

    let mut raw = skinned_triangle(&[(0, 0.1), (1, 0.6), (0, 0.2), (1, 0.05), (0, 0.05)]);
    raw.condense(3, true);

    assert_eq!(raw.global_weight_count(), 3);
    assert_ne!(raw.vertex_attributes() & ATTR_JOINT_WEIGHTS, 0);

    let v = raw.vertex(0);
    assert_eq!(v.joint_indices.len(), 1);
    assert_eq!(v.joint_indices[0], [1, 0, 0, 0]);
    let total: f32 = v.joint_weights[0].iter().sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert!((v.joint_weights[0][0] - 0.6 / 0.9).abs() < 1e-6);
    assert_eq!(v.joint_weights[0][3], 0.0);

    // a second pass is a fixed point
    let before = raw.vertices().to_vec();
    raw.condense(3, true);
    assert_eq!(raw.vertex_count(), before.len());
    for (after, before) in raw.vertices().iter().zip(&before) {
        assert_eq!(after.joint_indices, before.joint_indices);
        for (a, b) in after.joint_weights[0].iter().zip(&before.joint_weights[0]) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    println!("✅ Weights sorted and normalized");
}

/// Skinned geometry exports one JOINTS/WEIGHTS pair and a skin per surface
#[test]
fn skinned_surface_exports_skin() {
    println!("\n🔍 Testing: Skin export");

    let tmp = TempDir::new().unwrap();
    let mut raw = skinned_triangle(&[(0, 0.5), (1, 0.5)]);
    raw.condense(4, true);

    let data = raw_to_gltf(&raw, &GltfOptions::default(), tmp.path()).expect("conversion");
    let path = tmp.path().join("skinned.gltf");
    data.write(&path).unwrap();

    let (document, buffers, _) = gltf::import(&path).expect("output loads");
    let skin = document.skins().next().expect("a skin");
    let joints: Vec<&str> = skin.joints().filter_map(|j| j.name()).collect();
    assert_eq!(joints, vec!["hip", "knee"]);
    assert_eq!(skin.skeleton().and_then(|n| n.name()), Some("hip"));

    let primitive = document.meshes().next().unwrap().primitives().next().unwrap();
    let reader = primitive.reader(|b| Some(&buffers[b.index()]));
    let weights: Vec<[f32; 4]> = reader.read_weights(0).expect("WEIGHTS_0").into_f32().collect();
    assert_eq!(weights[0], [0.5, 0.5, 0.0, 0.0]);
    assert!(reader.read_weights(1).is_none());

    let ibm: Vec<[[f32; 4]; 4]> = skin
        .reader(|b| Some(&buffers[b.index()]))
        .read_inverse_bind_matrices()
        .unwrap()
        .collect();
    assert_eq!(ibm.len(), 2);
    assert_eq!(ibm[1][3], [0.0, -1.0, 0.0, 1.0]);

    println!("✅ Skin exported with {} joints", joints.len());
}

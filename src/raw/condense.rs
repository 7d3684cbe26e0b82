use std::cmp::Ordering;
use std::collections::HashMap;

use super::types::*;
use super::RawModel;

impl RawModel {
    /// Drop every surface, material, texture and vertex that no triangle
    /// references, then sort, truncate and (optionally) normalize each
    /// vertex's skin weights and pad them into 4-wide joint blocks.
    pub fn condense(&mut self, max_skinning_weights: usize, normalize_weights: bool) {
        self.condense_surfaces();
        self.condense_materials();
        self.condense_vertices(max_skinning_weights, normalize_weights);

        log::debug!(
            "Condensed model: {} vertices, {} triangles, {} materials, {} textures, {} surfaces, max {} weights",
            self.vertices.len(),
            self.triangles.len(),
            self.materials.len(),
            self.textures.len(),
            self.surfaces.len(),
            self.global_max_weights
        );
    }

    fn condense_surfaces(&mut self) {
        let old_surfaces = std::mem::take(&mut self.surfaces);
        let mut remap: HashMap<usize, usize> = HashMap::new();

        for tri in &mut self.triangles {
            let old_index = tri.surface_index;
            let new_index = *remap.entry(old_index).or_insert_with(|| {
                let surface = &old_surfaces[old_index];
                match self.surfaces.iter().position(|s| s.id == surface.id) {
                    Some(existing) => existing,
                    None => {
                        self.surfaces.push(surface.clone());
                        self.surfaces.len() - 1
                    }
                }
            });
            tri.surface_index = new_index;
        }

        for node in &mut self.nodes {
            if let Some(surface_id) = node.surface_id {
                if !self.surfaces.iter().any(|s| s.id == surface_id) {
                    node.surface_id = None;
                }
            }
        }
    }

    fn condense_materials(&mut self) {
        let old_materials = std::mem::take(&mut self.materials);
        let old_textures = std::mem::take(&mut self.textures);
        let mut texture_remap: HashMap<usize, usize> = HashMap::new();
        let mut material_remap: HashMap<usize, usize> = HashMap::new();

        for tri_index in 0..self.triangles.len() {
            let old_index = self.triangles[tri_index].material_index;
            let new_index = match material_remap.get(&old_index) {
                Some(&index) => index,
                None => {
                    let mut material = old_materials[old_index].clone();
                    for slot in material.textures.iter_mut() {
                        if let Some(old_tex) = *slot {
                            let new_tex = *texture_remap.entry(old_tex).or_insert_with(|| {
                                self.textures.push(old_textures[old_tex].clone());
                                self.textures.len() - 1
                            });
                            *slot = Some(new_tex);
                        }
                    }
                    let index = self.add_material(material);
                    material_remap.insert(old_index, index);
                    index
                }
            };
            self.triangles[tri_index].material_index = new_index;
        }
    }

    fn condense_vertices(&mut self, max_skinning_weights: usize, normalize_weights: bool) {
        let mut old_vertices = std::mem::take(&mut self.vertices);
        self.vertex_hash.clear();

        let mut referenced = vec![false; old_vertices.len()];
        for tri in &self.triangles {
            for &v in &tri.verts {
                referenced[v] = true;
            }
        }

        let mut max_weights = 0;
        for (vertex, _) in old_vertices.iter_mut().zip(&referenced).filter(|(_, r)| **r) {
            let skin = &mut vertex.skinning_info;
            skin.sort_by(|a, b| {
                b.joint_weight
                    .partial_cmp(&a.joint_weight)
                    .unwrap_or(Ordering::Equal)
            });
            skin.truncate(max_skinning_weights);

            if normalize_weights {
                let total: f32 = skin.iter().map(|s| s.joint_weight).sum();
                if total > 0.0 {
                    for s in skin.iter_mut() {
                        s.joint_weight /= total;
                    }
                }
            }
            max_weights = max_weights.max(skin.len());
        }
        self.global_max_weights = max_weights;

        if max_weights > 0 {
            self.vertex_attributes |= ATTR_JOINT_INDICES | ATTR_JOINT_WEIGHTS;
        }

        let blocks = max_weights.div_ceil(4);
        for vertex in old_vertices.iter_mut() {
            vertex.joint_indices = vec![[0; 4]; blocks];
            vertex.joint_weights = vec![[0.0; 4]; blocks];
            for (i, s) in vertex.skinning_info.iter().enumerate().take(blocks * 4) {
                vertex.joint_indices[i / 4][i % 4] = s.joint_index;
                vertex.joint_weights[i / 4][i % 4] = s.joint_weight;
            }
        }

        let mut remap: HashMap<usize, usize> = HashMap::new();
        for tri_index in 0..self.triangles.len() {
            for corner in 0..3 {
                let old = self.triangles[tri_index].verts[corner];
                let new = match remap.get(&old) {
                    Some(&index) => index,
                    None => {
                        let index = self.add_vertex(old_vertices[old].clone());
                        remap.insert(old, index);
                        index
                    }
                };
                self.triangles[tri_index].verts[corner] = new;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

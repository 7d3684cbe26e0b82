use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::raw::ComputeNormals;

/// Index width policy for primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseLongIndices {
    /// 16-bit indices only; large sub-models are split to fit.
    Never,
    /// 32-bit indices for primitives with more than 65535 vertices.
    #[default]
    Auto,
    Always,
}

/// `EXT_meshopt_compression` settings. Quantization is in mantissa bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionOptions {
    pub enabled: bool,
    /// 0..=10; 7 and above also reorders indices for the vertex cache.
    pub level: u32,
    pub quant_bits_position: u32,
    pub quant_bits_tex_coord: u32,
    pub quant_bits_normal: u32,
    pub quant_bits_color: u32,
    pub quant_bits_generic: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            level: 7,
            quant_bits_position: 14,
            quant_bits_tex_coord: 10,
            quant_bits_normal: 10,
            quant_bits_color: 8,
            quant_bits_generic: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GltfOptions {
    /// Write a single `.glb` instead of `.gltf` + `buffer.bin`.
    pub output_binary: bool,
    /// Inline the buffer and images as `data:` URIs (non-binary mode).
    pub embed_resources: bool,
    /// `ATTR_*` mask of vertex channels to export; `None` keeps all.
    pub keep_attribs: Option<u32>,
    pub use_long_indices: UseLongIndices,
    pub compute_normals: ComputeNormals,
    pub max_skinning_weights: usize,
    pub normalize_weights: bool,
    pub use_pbr_met_rough: bool,
    pub use_khr_mat_unlit: bool,
    pub use_khr_lights_punctual: bool,
    pub use_blend_shape_normals: bool,
    pub use_blend_shape_tangents: bool,
    pub use_sparse_blend_shapes: bool,
    pub enable_user_properties: bool,
    pub compression: CompressionOptions,
}

impl Default for GltfOptions {
    fn default() -> Self {
        Self {
            output_binary: false,
            embed_resources: false,
            keep_attribs: None,
            use_long_indices: UseLongIndices::Auto,
            compute_normals: ComputeNormals::Broken,
            max_skinning_weights: 4,
            normalize_weights: true,
            use_pbr_met_rough: true,
            use_khr_mat_unlit: false,
            use_khr_lights_punctual: true,
            use_blend_shape_normals: false,
            use_blend_shape_tangents: false,
            use_sparse_blend_shapes: false,
            enable_user_properties: false,
            compression: CompressionOptions::default(),
        }
    }
}

impl GltfOptions {
    /// Load options from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid options file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let opts: GltfOptions =
            serde_json::from_str(r#"{"output_binary": true, "use_long_indices": "never", "compression": {"enabled": true}}"#)
                .unwrap();
        assert!(opts.output_binary);
        assert_eq!(opts.use_long_indices, UseLongIndices::Never);
        assert!(opts.compression.enabled);
        assert_eq!(opts.compression.quant_bits_position, 14);
        assert_eq!(opts.max_skinning_weights, 4);
        assert_eq!(opts.compute_normals, ComputeNormals::Broken);
    }
}

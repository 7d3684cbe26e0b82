//! meshoptimizer encoding for `EXT_meshopt_compression`.
//!
//! Attribute streams are encoded in `ATTRIBUTES` mode, index lists in
//! `TRIANGLES` mode. Float streams can be pre-quantized by dropping
//! mantissa bits, which makes the byte-delta coder far more effective.

use super::error::ConvertError;
use super::options::CompressionOptions;

pub const EXT_MESHOPT_COMPRESSION: &str = "EXT_meshopt_compression";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshoptMode {
    Attributes,
    Triangles,
}

impl MeshoptMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MeshoptMode::Attributes => "ATTRIBUTES",
            MeshoptMode::Triangles => "TRIANGLES",
        }
    }
}

/// Which quantization depth an attribute stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Position,
    Normal,
    TexCoord,
    Color,
    Generic,
}

impl StreamKind {
    pub fn quant_bits(self, options: &CompressionOptions) -> u32 {
        match self {
            StreamKind::Position => options.quant_bits_position,
            StreamKind::Normal => options.quant_bits_normal,
            StreamKind::TexCoord => options.quant_bits_tex_coord,
            StreamKind::Color => options.quant_bits_color,
            StreamKind::Generic => options.quant_bits_generic,
        }
    }
}

/// Round `value` to `bits` mantissa bits (1..=23). Non-finite values pass
/// through.
pub fn quantize_mantissa(value: f32, bits: u32) -> f32 {
    if !value.is_finite() || bits == 0 || bits >= 23 {
        return value;
    }
    let drop = 23 - bits;
    let raw = value.to_bits();
    let half = 1u32 << (drop - 1);
    let mask = !((1u32 << drop) - 1);
    let rounded = raw.wrapping_add(half) & mask;
    let result = f32::from_bits(rounded);
    if result.is_finite() {
        result
    } else {
        value
    }
}

/// Quantize every little-endian f32 in `bytes` in place.
pub fn quantize_f32_bytes(bytes: &mut [u8], bits: u32) {
    for chunk in bytes.chunks_exact_mut(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&quantize_mantissa(value, bits).to_le_bytes());
    }
}

/// Encode a vertex stream of `stride`-byte elements.
pub fn encode_attributes(bytes: &[u8], stride: usize) -> Result<Vec<u8>, ConvertError> {
    if stride == 0 || bytes.len() % stride != 0 {
        return Err(ConvertError::Compression(format!(
            "{} bytes do not split into {}-byte elements",
            bytes.len(),
            stride
        )));
    }
    let encoded = match stride {
        4 => meshopt::encode_vertex_buffer(bytemuck::cast_slice::<u8, [u8; 4]>(bytes)),
        8 => meshopt::encode_vertex_buffer(bytemuck::cast_slice::<u8, [u8; 8]>(bytes)),
        12 => meshopt::encode_vertex_buffer(bytemuck::cast_slice::<u8, [u8; 12]>(bytes)),
        16 => meshopt::encode_vertex_buffer(bytemuck::cast_slice::<u8, [u8; 16]>(bytes)),
        other => {
            return Err(ConvertError::Compression(format!(
                "unsupported vertex stride {}",
                other
            )))
        }
    };
    encoded.map_err(|e| ConvertError::Compression(e.to_string()))
}

/// Encode a triangle list.
pub fn encode_triangles(indices: &[u32], vertex_count: usize) -> Result<Vec<u8>, ConvertError> {
    if indices.len() % 3 != 0 {
        return Err(ConvertError::Compression(format!(
            "{} indices is not a triangle list",
            indices.len()
        )));
    }
    meshopt::encode_index_buffer(indices, vertex_count).map_err(|e| ConvertError::Compression(e.to_string()))
}

/// Reorder a triangle list for the post-transform vertex cache.
pub fn optimize_for_cache(indices: &[u32], vertex_count: usize) -> Vec<u32> {
    meshopt::optimize_vertex_cache(indices, vertex_count)
}

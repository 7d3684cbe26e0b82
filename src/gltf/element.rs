//! Typed element encoding for accessors.
//!
//! Every value written into the binary blob implements [`GltfElement`],
//! which pairs a wire type (`GlType`) with a little-endian writer.
//! Vectors and quaternions go out component by component; matrices go out
//! column-major with each column padded to a 4-byte boundary.

use ::gltf::json as gltf_json;
use gltf_json::accessor::{ComponentType, Type};

use super::error::ConvertError;
use crate::math::{Mat4f, Quatf, Vec2f, Vec3f, Vec4f};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlType {
    pub component: ComponentType,
    pub kind: Type,
}

pub const GL_FLOAT: GlType = GlType::new(ComponentType::F32, Type::Scalar);
pub const GL_VEC2F: GlType = GlType::new(ComponentType::F32, Type::Vec2);
pub const GL_VEC3F: GlType = GlType::new(ComponentType::F32, Type::Vec3);
pub const GL_VEC4F: GlType = GlType::new(ComponentType::F32, Type::Vec4);
pub const GL_QUATF: GlType = GL_VEC4F;
pub const GL_MAT4F: GlType = GlType::new(ComponentType::F32, Type::Mat4);
pub const GL_USHORT: GlType = GlType::new(ComponentType::U16, Type::Scalar);
pub const GL_UINT: GlType = GlType::new(ComponentType::U32, Type::Scalar);
pub const GL_VEC4US: GlType = GlType::new(ComponentType::U16, Type::Vec4);

impl GlType {
    pub const fn new(component: ComponentType, kind: Type) -> Self {
        Self { component, kind }
    }

    pub fn component_size(&self) -> usize {
        match self.component {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    pub fn component_count(&self) -> usize {
        match self.kind {
            Type::Scalar => 1,
            Type::Vec2 => 2,
            Type::Vec3 => 3,
            Type::Vec4 | Type::Mat2 => 4,
            Type::Mat3 => 9,
            Type::Mat4 => 16,
        }
    }

    fn matrix_dim(&self) -> Option<usize> {
        match self.kind {
            Type::Mat2 => Some(2),
            Type::Mat3 => Some(3),
            Type::Mat4 => Some(4),
            _ => None,
        }
    }

    /// Bytes one element occupies, including matrix column padding.
    pub fn byte_size(&self) -> Result<usize, ConvertError> {
        match self.matrix_dim() {
            Some(dim) => Ok(matrix_column_stride(self.component_size(), dim)? * dim),
            None => Ok(self.component_size() * self.component_count()),
        }
    }
}

/// Byte stride between matrix columns: glTF starts every column on a
/// 4-byte boundary, which only changes anything for 1- and 2-byte
/// components in 2x2 and 3x3 matrices.
pub fn matrix_column_stride(component_size: usize, dim: usize) -> Result<usize, ConvertError> {
    if !matches!(component_size, 1 | 2 | 4) || !(2..=4).contains(&dim) {
        return Err(ConvertError::InvalidMatrixLayout { component_size, dim });
    }
    Ok((component_size * dim).next_multiple_of(4))
}

pub trait GltfElement {
    const GL_TYPE: GlType;

    fn write_le(&self, out: &mut Vec<u8>);
}

/// Serialize a slice of elements into fresh bytes.
pub fn to_bytes<T: GltfElement>(items: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(items.len() * T::GL_TYPE.component_size() * T::GL_TYPE.component_count());
    for item in items {
        item.write_le(&mut out);
    }
    out
}

fn write_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

impl GltfElement for f32 {
    const GL_TYPE: GlType = GL_FLOAT;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl GltfElement for u16 {
    const GL_TYPE: GlType = GL_USHORT;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl GltfElement for u32 {
    const GL_TYPE: GlType = GL_UINT;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl GltfElement for Vec2f {
    const GL_TYPE: GlType = GL_VEC2F;

    fn write_le(&self, out: &mut Vec<u8>) {
        write_f32s(out, &[self.x, self.y]);
    }
}

impl GltfElement for Vec3f {
    const GL_TYPE: GlType = GL_VEC3F;

    fn write_le(&self, out: &mut Vec<u8>) {
        write_f32s(out, &[self.x, self.y, self.z]);
    }
}

impl GltfElement for Vec4f {
    const GL_TYPE: GlType = GL_VEC4F;

    fn write_le(&self, out: &mut Vec<u8>) {
        write_f32s(out, &[self.x, self.y, self.z, self.w]);
    }
}

impl GltfElement for [f32; 4] {
    const GL_TYPE: GlType = GL_VEC4F;

    fn write_le(&self, out: &mut Vec<u8>) {
        write_f32s(out, self);
    }
}

/// Joint indices, narrowed to the `JOINTS_n` unsigned-short layout.
impl GltfElement for [u32; 4] {
    const GL_TYPE: GlType = GL_VEC4US;

    fn write_le(&self, out: &mut Vec<u8>) {
        for j in self {
            out.extend_from_slice(&(*j as u16).to_le_bytes());
        }
    }
}

impl GltfElement for Quatf {
    const GL_TYPE: GlType = GL_QUATF;

    fn write_le(&self, out: &mut Vec<u8>) {
        write_f32s(out, &[self.v.x, self.v.y, self.v.z, self.s]);
    }
}

impl GltfElement for Mat4f {
    const GL_TYPE: GlType = GL_MAT4F;

    fn write_le(&self, out: &mut Vec<u8>) {
        // cgmath stores columns, which is already glTF order
        for column in [self.x, self.y, self.z, self.w] {
            write_f32s(out, &[column.x, column.y, column.z, column.w]);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

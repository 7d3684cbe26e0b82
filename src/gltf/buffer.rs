//! Binary blob, buffer views and accessors.
//!
//! `GltfBuilder` owns the one growable blob every view points into, plus the
//! JSON arrays the assembler fills. Views are only ever appended, so a view's
//! offset stays valid for the life of the builder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ::gltf::json as gltf_json;
use anyhow::{anyhow, Result};
use gltf_json::accessor::{sparse, ComponentType, GenericComponentType, IndexComponentType};
use gltf_json::buffer::{Stride, Target};
use gltf_json::extensions::scene::khr_lights_punctual;
use gltf_json::validation::{Checked, USize64};
use gltf_json::Index;

use super::compress::{self, MeshoptMode, StreamKind, EXT_MESHOPT_COMPRESSION};
use super::element::{to_bytes, GlType, GltfElement};
use super::error::{WarningCounter, WarningKind};
use super::options::CompressionOptions;

const ALIGNMENT: usize = 4;

pub struct GltfBuilder {
    pub buffers: Vec<gltf_json::Buffer>,
    pub buffer_views: Vec<gltf_json::buffer::View>,
    pub accessors: Vec<gltf_json::Accessor>,
    pub images: Vec<gltf_json::Image>,
    pub samplers: Vec<gltf_json::texture::Sampler>,
    pub textures: Vec<gltf_json::Texture>,
    pub materials: Vec<gltf_json::Material>,
    pub meshes: Vec<gltf_json::Mesh>,
    pub skins: Vec<gltf_json::Skin>,
    pub animations: Vec<gltf_json::Animation>,
    pub cameras: Vec<gltf_json::Camera>,
    pub nodes: Vec<gltf_json::Node>,
    pub lights: Vec<khr_lights_punctual::Light>,
    pub binary: Vec<u8>,
    pub warnings: WarningCounter,
    compression: Option<CompressionOptions>,
    fallback_buffer: Option<Index<gltf_json::Buffer>>,
    fallback_length: usize,
    file_views: HashMap<PathBuf, Option<Index<gltf_json::buffer::View>>>,
}

impl GltfBuilder {
    /// Buffer 0 always exists and is backed by `binary`.
    pub fn new(compression: Option<CompressionOptions>) -> Self {
        Self {
            buffers: vec![gltf_json::Buffer {
                byte_length: USize64(0),
                name: None,
                uri: None,
                extensions: None,
                extras: None,
            }],
            buffer_views: Vec::new(),
            accessors: Vec::new(),
            images: Vec::new(),
            samplers: Vec::new(),
            textures: Vec::new(),
            materials: Vec::new(),
            meshes: Vec::new(),
            skins: Vec::new(),
            animations: Vec::new(),
            cameras: Vec::new(),
            nodes: Vec::new(),
            lights: Vec::new(),
            binary: Vec::new(),
            warnings: WarningCounter::new(),
            compression,
            fallback_buffer: None,
            fallback_length: 0,
            file_views: HashMap::new(),
        }
    }

    pub fn compression(&self) -> Option<&CompressionOptions> {
        self.compression.as_ref()
    }

    pub fn uses_compression(&self) -> bool {
        self.fallback_buffer.is_some()
    }

    pub fn warn(&mut self, kind: WarningKind, message: impl AsRef<str>) {
        self.warnings.warn(kind, message);
    }

    fn pad_binary(&mut self) {
        while self.binary.len() % ALIGNMENT != 0 {
            self.binary.push(0);
        }
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Start an empty view at the next 4-byte boundary of the blob.
    pub fn aligned_view(&mut self, target: Option<Target>) -> Index<gltf_json::buffer::View> {
        self.pad_binary();
        self.buffer_views.push(gltf_json::buffer::View {
            buffer: Index::new(0),
            byte_length: USize64(0),
            byte_offset: Some(USize64::from(self.binary.len())),
            byte_stride: None,
            name: None,
            target: target.map(Checked::Valid),
            extensions: None,
            extras: None,
        });
        Index::new(self.buffer_views.len() as u32 - 1)
    }

    /// Copy `bytes` into a view of their own.
    pub fn add_raw_view(&mut self, bytes: &[u8], target: Option<Target>) -> Index<gltf_json::buffer::View> {
        let view = self.aligned_view(target);
        self.binary.extend_from_slice(bytes);
        self.buffer_views[view.value()].byte_length = USize64::from(bytes.len());
        view
    }

    /// View holding a file's bytes, read once per path. Failed reads are
    /// remembered too.
    pub fn view_for_file(&mut self, path: &Path) -> Option<Index<gltf_json::buffer::View>> {
        if let Some(cached) = self.file_views.get(path) {
            return *cached;
        }
        let view = match std::fs::read(path) {
            Ok(bytes) => Some(self.add_raw_view(&bytes, None)),
            Err(e) => {
                self.warn(
                    WarningKind::MissingTexture,
                    format!("Couldn't read {}: {}", path.display(), e),
                );
                None
            }
        };
        self.file_views.insert(path.to_path_buf(), view);
        view
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Append `data` to the end of `view`, which must be the newest view.
    pub fn accessor_with_view<T: GltfElement>(
        &mut self,
        view: Index<gltf_json::buffer::View>,
        data: &[T],
        name: &str,
    ) -> Result<Index<gltf_json::Accessor>> {
        let bytes = to_bytes(data);
        let view_data = &self.buffer_views[view.value()];
        let view_start = view_data.byte_offset.map_or(0, |o| o.0 as usize);
        let view_length = view_data.byte_length.0 as usize;
        if view_start + view_length != self.binary.len() {
            return Err(anyhow!("Buffer view {} is not at the end of the blob", view.value()));
        }

        self.binary.extend_from_slice(&bytes);
        self.buffer_views[view.value()].byte_length = USize64::from(view_length + bytes.len());

        Ok(self.push_accessor(
            Some(view),
            view_length,
            T::GL_TYPE,
            data.len(),
            name,
        ))
    }

    /// Fresh aligned view holding exactly `data`.
    pub fn accessor_and_view<T: GltfElement>(
        &mut self,
        data: &[T],
        target: Option<Target>,
        name: &str,
    ) -> Result<Index<gltf_json::Accessor>> {
        let view = self.aligned_view(target);
        self.accessor_with_view(view, data, name)
    }

    fn push_accessor(
        &mut self,
        view: Option<Index<gltf_json::buffer::View>>,
        byte_offset: usize,
        gl_type: GlType,
        count: usize,
        name: &str,
    ) -> Index<gltf_json::Accessor> {
        self.accessors.push(gltf_json::Accessor {
            buffer_view: view,
            byte_offset: view.map(|_| USize64::from(byte_offset)),
            component_type: Checked::Valid(GenericComponentType(gl_type.component)),
            count: USize64::from(count),
            extensions: None,
            extras: None,
            max: None,
            min: None,
            name: (!name.is_empty()).then(|| name.to_string()),
            normalized: false,
            sparse: None,
            type_: Checked::Valid(gl_type.kind),
        });
        Index::new(self.accessors.len() as u32 - 1)
    }

    pub fn set_bounds(
        &mut self,
        accessor: Index<gltf_json::Accessor>,
        min: serde_json::Value,
        max: serde_json::Value,
    ) {
        let acc = &mut self.accessors[accessor.value()];
        acc.min = Some(min);
        acc.max = Some(max);
    }

    /// Whether storing `changed` of `total` elements sparsely is smaller
    /// than storing them all.
    pub fn sparse_is_beneficial(changed: usize, total: usize, element_size: usize) -> bool {
        let index_size = if total <= u16::MAX as usize { 2 } else { 4 };
        changed * (index_size + element_size) < total * element_size
    }

    /// Sparse accessor overriding `base` (or zeros) wherever `values`
    /// differs from `base_values`.
    pub fn sparse_accessor<T: GltfElement + PartialEq>(
        &mut self,
        base: Option<Index<gltf_json::Accessor>>,
        base_values: &[T],
        values: &[T],
        name: &str,
    ) -> Result<Index<gltf_json::Accessor>> {
        if base_values.len() != values.len() {
            return Err(anyhow!(
                "Sparse base has {} elements, values have {}",
                base_values.len(),
                values.len()
            ));
        }
        let changed: Vec<usize> = values
            .iter()
            .zip(base_values)
            .enumerate()
            .filter(|(_, (v, b))| v != b)
            .map(|(i, _)| i)
            .collect();
        let changed_values: Vec<&T> = changed.iter().map(|&i| &values[i]).collect();

        let (base_view, base_offset) = match base {
            Some(b) => {
                let acc = &self.accessors[b.value()];
                (acc.buffer_view, acc.byte_offset.map_or(0, |o| o.0 as usize))
            }
            None => (None, 0),
        };

        let accessor = self.push_accessor(base_view, base_offset, T::GL_TYPE, values.len(), name);
        if changed.is_empty() {
            return Ok(accessor);
        }

        let (index_bytes, index_type) = if values.len() <= u16::MAX as usize {
            (to_bytes(&changed.iter().map(|&i| i as u16).collect::<Vec<_>>()), ComponentType::U16)
        } else {
            (to_bytes(&changed.iter().map(|&i| i as u32).collect::<Vec<_>>()), ComponentType::U32)
        };
        let indices_view = self.add_raw_view(&index_bytes, None);

        let mut value_bytes = Vec::new();
        for v in changed_values {
            v.write_le(&mut value_bytes);
        }
        let values_view = self.add_raw_view(&value_bytes, None);

        self.accessors[accessor.value()].sparse = Some(sparse::Sparse {
            count: USize64::from(changed.len()),
            indices: sparse::Indices {
                buffer_view: indices_view,
                byte_offset: USize64(0),
                component_type: Checked::Valid(IndexComponentType(index_type)),
                extensions: None,
                extras: None,
            },
            values: sparse::Values {
                buffer_view: values_view,
                byte_offset: USize64(0),
                extensions: None,
                extras: None,
            },
            extensions: None,
            extras: None,
        });
        Ok(accessor)
    }

    // ========================================================================
    // Compressed streams
    // ========================================================================

    /// Store `encoded` bytes in buffer 0 and return a view in the fallback
    /// buffer that stands for the decoded stream.
    fn compressed_view(
        &mut self,
        encoded: &[u8],
        decoded_length: usize,
        stride: usize,
        count: usize,
        mode: MeshoptMode,
        target: Option<Target>,
    ) -> Index<gltf_json::buffer::View> {
        self.pad_binary();
        let encoded_offset = self.binary.len();
        self.binary.extend_from_slice(encoded);

        let fallback = match self.fallback_buffer {
            Some(index) => index,
            None => {
                let mut others = serde_json::Map::new();
                others.insert(
                    EXT_MESHOPT_COMPRESSION.to_string(),
                    serde_json::json!({ "fallback": true }),
                );
                self.buffers.push(gltf_json::Buffer {
                    byte_length: USize64(0),
                    name: None,
                    uri: None,
                    extensions: Some(gltf_json::extensions::buffer::Buffer { others }),
                    extras: None,
                });
                let index = Index::new(self.buffers.len() as u32 - 1);
                self.fallback_buffer = Some(index);
                index
            }
        };

        let fallback_offset = self.fallback_length.next_multiple_of(ALIGNMENT);
        self.fallback_length = fallback_offset + decoded_length;

        let mut others = serde_json::Map::new();
        others.insert(
            EXT_MESHOPT_COMPRESSION.to_string(),
            serde_json::json!({
                "buffer": 0,
                "byteOffset": encoded_offset,
                "byteLength": encoded.len(),
                "byteStride": stride,
                "count": count,
                "mode": mode.as_str(),
            }),
        );

        self.buffer_views.push(gltf_json::buffer::View {
            buffer: fallback,
            byte_length: USize64::from(decoded_length),
            byte_offset: Some(USize64::from(fallback_offset)),
            byte_stride: (mode == MeshoptMode::Attributes && target == Some(Target::ArrayBuffer))
                .then_some(Stride(stride)),
            name: None,
            target: target.map(Checked::Valid),
            extensions: Some(gltf_json::extensions::buffer::View { others }),
            extras: None,
        });
        Index::new(self.buffer_views.len() as u32 - 1)
    }

    fn compressed_stream<T: GltfElement>(
        &mut self,
        data: &[T],
        quant_bits: Option<u32>,
        target: Option<Target>,
        name: &str,
    ) -> Result<Index<gltf_json::Accessor>> {
        let stride = T::GL_TYPE.byte_size()?;
        let mut bytes = to_bytes(data);
        if let Some(bits) = quant_bits {
            if T::GL_TYPE.component == ComponentType::F32 {
                compress::quantize_f32_bytes(&mut bytes, bits);
            }
        }
        let encoded = compress::encode_attributes(&bytes, stride)?;
        let view = self.compressed_view(&encoded, bytes.len(), stride, data.len(), MeshoptMode::Attributes, target);
        Ok(self.push_accessor(Some(view), 0, T::GL_TYPE, data.len(), name))
    }

    /// Vertex attribute accessor, compressed when compression is on.
    pub fn attribute_accessor<T: GltfElement>(
        &mut self,
        data: &[T],
        kind: StreamKind,
        name: &str,
    ) -> Result<Index<gltf_json::Accessor>> {
        match self.compression {
            Some(options) => {
                let bits = kind.quant_bits(&options);
                self.compressed_stream(data, Some(bits), Some(Target::ArrayBuffer), name)
            }
            None => self.accessor_and_view(data, Some(Target::ArrayBuffer), name),
        }
    }

    /// Animation input/output accessor, compressed when compression is on.
    pub fn keyframe_accessor<T: GltfElement>(
        &mut self,
        data: &[T],
        name: &str,
    ) -> Result<Index<gltf_json::Accessor>> {
        if self.compression.is_some() {
            self.compressed_stream(data, None, None, name)
        } else {
            self.accessor_and_view(data, None, name)
        }
    }

    /// Triangle index accessor, 16- or 32-bit.
    pub fn index_accessor(
        &mut self,
        indices: &[u32],
        long_indices: bool,
        vertex_count: usize,
        name: &str,
    ) -> Result<Index<gltf_json::Accessor>> {
        if self.compression.is_some() {
            let element_size = if long_indices { 4 } else { 2 };
            let encoded = compress::encode_triangles(indices, vertex_count)?;
            let view = self.compressed_view(
                &encoded,
                indices.len() * element_size,
                element_size,
                indices.len(),
                MeshoptMode::Triangles,
                Some(Target::ElementArrayBuffer),
            );
            let gl_type = if long_indices { u32::GL_TYPE } else { u16::GL_TYPE };
            return Ok(self.push_accessor(Some(view), 0, gl_type, indices.len(), name));
        }

        let target = Some(Target::ElementArrayBuffer);
        if long_indices {
            self.accessor_and_view(indices, target, name)
        } else {
            let short: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
            self.accessor_and_view(&short, target, name)
        }
    }

    /// Close out buffer lengths once everything is written.
    pub fn finish_buffers(&mut self) {
        self.pad_binary();
        self.buffers[0].byte_length = USize64::from(self.binary.len());
        if let Some(fallback) = self.fallback_buffer {
            self.buffers[fallback.value()].byte_length =
                USize64::from(self.fallback_length.next_multiple_of(ALIGNMENT));
        }
    }
}

// ============================================================================
// Reading accessors back
// ============================================================================

fn read_u32_le(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| anyhow!("Read past end of buffer at {}", at))
}

fn view_range(root: &gltf_json::Root, view: Index<gltf_json::buffer::View>) -> Result<(usize, Option<usize>)> {
    let view = root
        .buffer_views
        .get(view.value())
        .ok_or_else(|| anyhow!("Buffer view {} does not exist", view.value()))?;
    if view.buffer.value() != 0 {
        return Err(anyhow!("Only buffer 0 can be read back"));
    }
    Ok((
        view.byte_offset.map_or(0, |o| o.0 as usize),
        view.byte_stride.map(|s| s.0),
    ))
}

/// Decode a float accessor (dense, sparse or both) into flat components.
pub fn read_f32_accessor(root: &gltf_json::Root, blob: &[u8], accessor: usize) -> Result<Vec<f32>> {
    let acc = root
        .accessors
        .get(accessor)
        .ok_or_else(|| anyhow!("Accessor {} does not exist", accessor))?;
    let kind = match acc.type_ {
        Checked::Valid(kind) => kind,
        Checked::Invalid => return Err(anyhow!("Accessor {} has an invalid type", accessor)),
    };
    let gl_type = GlType::new(ComponentType::F32, kind);
    let components = gl_type.component_count();
    let element_size = gl_type.byte_size()?;
    let count = acc.count.0 as usize;

    let mut out = vec![0.0f32; count * components];
    if let Some(view) = acc.buffer_view {
        let (view_offset, stride) = view_range(root, view)?;
        let start = view_offset + acc.byte_offset.map_or(0, |o| o.0 as usize);
        let stride = stride.unwrap_or(element_size);
        for i in 0..count {
            for c in 0..components {
                let bits = read_u32_le(blob, start + i * stride + c * 4)?;
                out[i * components + c] = f32::from_bits(bits);
            }
        }
    }

    if let Some(sp) = &acc.sparse {
        let (indices_offset, _) = view_range(root, sp.indices.buffer_view)?;
        let (values_offset, _) = view_range(root, sp.values.buffer_view)?;
        let indices_start = indices_offset + sp.indices.byte_offset.0 as usize;
        let values_start = values_offset + sp.values.byte_offset.0 as usize;
        let index_type = match sp.indices.component_type {
            Checked::Valid(IndexComponentType(t)) => t,
            Checked::Invalid => return Err(anyhow!("Sparse indices have an invalid type")),
        };
        for k in 0..sp.count.0 as usize {
            let target = match index_type {
                ComponentType::U8 => *blob
                    .get(indices_start + k)
                    .ok_or_else(|| anyhow!("Sparse index out of range"))? as usize,
                ComponentType::U16 => {
                    let at = indices_start + k * 2;
                    let b = blob.get(at..at + 2).ok_or_else(|| anyhow!("Sparse index out of range"))?;
                    u16::from_le_bytes([b[0], b[1]]) as usize
                }
                _ => read_u32_le(blob, indices_start + k * 4)? as usize,
            };
            if target >= count {
                return Err(anyhow!("Sparse index {} exceeds count {}", target, count));
            }
            for c in 0..components {
                let bits = read_u32_le(blob, values_start + k * element_size + c * 4)?;
                out[target * components + c] = f32::from_bits(bits);
            }
        }
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3f;
    use cgmath::Vector3;

    fn root_of(builder: &GltfBuilder) -> gltf_json::Root {
        gltf_json::Root {
            accessors: builder.accessors.clone(),
            buffers: builder.buffers.clone(),
            buffer_views: builder.buffer_views.clone(),
            ..Default::default()
        }
    }

    #[test]
    fn views_are_four_byte_aligned() {
        let mut builder = GltfBuilder::new(None);
        builder.add_raw_view(&[1, 2, 3], None);
        builder.accessor_and_view(&[7u16], None, "short").unwrap();
        builder.accessor_and_view(&[1.0f32, 2.0, 3.0], Some(Target::ArrayBuffer), "floats").unwrap();
        builder.add_raw_view(&[9], None);
        for view in &builder.buffer_views {
            assert_eq!(view.byte_offset.unwrap().0 % 4, 0);
        }
        builder.finish_buffers();
        assert_eq!(builder.binary.len() % 4, 0);
        assert_eq!(builder.buffers[0].byte_length.0 as usize, builder.binary.len());
    }

    #[test]
    fn accessor_with_view_appends_to_newest_view() {
        let mut builder = GltfBuilder::new(None);
        let view = builder.aligned_view(None);
        let a = builder.accessor_with_view(view, &[1.0f32, 2.0], "a").unwrap();
        let b = builder.accessor_with_view(view, &[3.0f32], "b").unwrap();
        assert_eq!(builder.accessors[b.value()].byte_offset.unwrap().0, 8);
        assert_eq!(builder.accessors[a.value()].count.0, 2);
        assert_eq!(builder.buffer_views[view.value()].byte_length.0, 12);

        builder.aligned_view(None);
        assert!(builder.accessor_with_view(view, &[4.0f32], "late").is_err());
    }

    #[test]
    fn file_views_are_memoized() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blob.bin");
        std::fs::write(&path, [1u8, 2, 3, 4, 5]).unwrap();

        let mut builder = GltfBuilder::new(None);
        let first = builder.view_for_file(&path);
        let second = builder.view_for_file(&path);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(builder.buffer_views.len(), 1);

        let missing = tmp.path().join("nope.bin");
        assert!(builder.view_for_file(&missing).is_none());
        assert!(builder.view_for_file(&missing).is_none());
        assert_eq!(builder.warnings.count(WarningKind::MissingTexture), 1);
    }

    #[test]
    fn sparse_and_dense_decode_alike() {
        let mut values: Vec<Vec3f> = vec![Vector3::new(0.0, 0.0, 0.0); 200];
        values[3] = Vector3::new(1.0, 2.0, 3.0);
        values[150] = Vector3::new(-1.0, 0.5, 0.25);
        let zeros = vec![Vector3::new(0.0, 0.0, 0.0); 200];

        let mut builder = GltfBuilder::new(None);
        let dense = builder.accessor_and_view(&values, Some(Target::ArrayBuffer), "dense").unwrap();
        let sparse = builder.sparse_accessor(None, &zeros, &values, "sparse").unwrap();
        assert!(builder.accessors[sparse.value()].buffer_view.is_none());
        assert_eq!(builder.accessors[sparse.value()].sparse.as_ref().unwrap().count.0, 2);

        let root = root_of(&builder);
        let a = read_f32_accessor(&root, &builder.binary, dense.value()).unwrap();
        let b = read_f32_accessor(&root, &builder.binary, sparse.value()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sparse_over_a_base_accessor() {
        let base: Vec<f32> = vec![1.0, 1.0, 1.0, 1.0];
        let mut values = base.clone();
        values[2] = 5.0;

        let mut builder = GltfBuilder::new(None);
        let base_acc = builder.accessor_and_view(&base, None, "base").unwrap();
        let sparse = builder.sparse_accessor(Some(base_acc), &base, &values, "over").unwrap();

        let root = root_of(&builder);
        assert_eq!(read_f32_accessor(&root, &builder.binary, sparse.value()).unwrap(), values);
    }

    #[test]
    fn sparse_benefit_threshold() {
        assert!(GltfBuilder::sparse_is_beneficial(2, 200, 12));
        assert!(!GltfBuilder::sparse_is_beneficial(150, 200, 12));
    }

    #[test]
    fn compressed_views_live_in_fallback_buffer() {
        let mut builder = GltfBuilder::new(Some(CompressionOptions {
            enabled: true,
            ..Default::default()
        }));
        let positions: Vec<Vec3f> = (0..10).map(|i| Vector3::new(i as f32, 0.0, 1.0)).collect();
        let acc = builder.attribute_accessor(&positions, StreamKind::Position, "POSITION").unwrap();
        let indices = builder.index_accessor(&[0, 1, 2, 2, 1, 3], false, 10, "indices").unwrap();
        builder.finish_buffers();

        assert!(builder.uses_compression());
        assert_eq!(builder.buffers.len(), 2);
        let view = &builder.buffer_views[builder.accessors[acc.value()].buffer_view.unwrap().value()];
        assert_eq!(view.buffer.value(), 1);
        assert_eq!(view.byte_length.0, 120);
        assert_eq!(view.byte_stride.map(|s| s.0), Some(12));
        let ext = &view.extensions.as_ref().unwrap().others[EXT_MESHOPT_COMPRESSION];
        assert_eq!(ext["mode"], "ATTRIBUTES");
        assert_eq!(ext["count"], 10);

        let index_view = &builder.buffer_views[builder.accessors[indices.value()].buffer_view.unwrap().value()];
        assert!(index_view.byte_stride.is_none());
        assert_eq!(index_view.extensions.as_ref().unwrap().others[EXT_MESHOPT_COMPRESSION]["mode"], "TRIANGLES");
        assert!(builder.buffers[1].byte_length.0 >= 132);
    }
}

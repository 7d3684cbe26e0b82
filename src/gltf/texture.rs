//! glTF images and textures from scene-model textures.
//!
//! `simple` passes one source image through; `combine` evaluates a per-pixel
//! function over several same-sized sources and writes a new image. Both are
//! memoized for the life of one conversion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ::gltf::json as gltf_json;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use gltf_json::validation::Checked;
use gltf_json::Index;

use super::buffer::GltfBuilder;
use super::error::WarningKind;
use crate::image_utils::{self, DecodedImage, EncodeFormat};
use crate::raw::{RawModel, RawTexture};

/// 1x1 fully transparent PNG used when a texture's file can't be found.
const STUB_PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8/5+hHgAHggJ/PchI7wAAAABJRU5ErkJggg==";

/// How image bytes reach the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutput {
    /// Stored in a buffer view of the binary blob.
    Binary,
    /// Inlined as a base64 `data:` URI.
    Embedded,
    /// Written next to the output document and referenced by relative URI.
    Folder,
}

/// Per-pixel merge function: one normalized RGBA sample per input, in
/// input order.
pub type PixelMerger<'f> = &'f dyn Fn(&[[f32; 4]]) -> [f32; 4];

pub struct TextureBuilder<'a> {
    raw: &'a RawModel,
    output: ImageOutput,
    output_folder: PathBuf,
    simple_cache: HashMap<String, Option<Index<gltf_json::Texture>>>,
    combine_cache: HashMap<String, Option<Index<gltf_json::Texture>>>,
    sampler: Option<Index<gltf_json::texture::Sampler>>,
    /// Output file names (lowercased) and the source each one was taken for.
    claimed_names: HashMap<String, String>,
}

impl<'a> TextureBuilder<'a> {
    pub fn new(raw: &'a RawModel, output: ImageOutput, output_folder: &Path) -> Self {
        Self {
            raw,
            output,
            output_folder: output_folder.to_path_buf(),
            simple_cache: HashMap::new(),
            combine_cache: HashMap::new(),
            sampler: None,
            claimed_names: HashMap::new(),
        }
    }

    /// Pass a source texture through unchanged.
    pub fn simple(
        &mut self,
        gltf: &mut GltfBuilder,
        raw_texture: usize,
        tag: &str,
    ) -> Option<Index<gltf_json::Texture>> {
        let key = format!("{}:{}", raw_texture, tag);
        if let Some(cached) = self.simple_cache.get(&key) {
            return *cached;
        }

        let raw = self.raw;
        let texture = &raw.textures()[raw_texture];
        let name = texture_base_name(texture);
        let path = source_path(texture);

        let image = match path.filter(|p| p.is_file()) {
            Some(path) => self.image_from_file(gltf, &path, &name),
            None => {
                gltf.warn(
                    WarningKind::MissingTexture,
                    format!("Texture '{}' ({}) not found, using a stub image", texture.name, texture.file_name),
                );
                Some(self.push_image(gltf, &name, ImageSource::Uri(STUB_PNG_DATA_URI.to_string()), None))
            }
        };

        let result = image.map(|image| self.push_texture(gltf, &name, image));
        self.simple_cache.insert(key, result);
        result
    }

    /// Merge up to N textures into a new image. Slots with `None`, or whose
    /// file can't be decoded, read as `(0, 0, 0, 1)`. Returns `None` when no
    /// input could be loaded or the inputs disagree on size.
    pub fn combine(
        &mut self,
        gltf: &mut GltfBuilder,
        raw_textures: &[Option<usize>],
        tag: &str,
        merge: PixelMerger<'_>,
        with_alpha: bool,
    ) -> Option<Index<gltf_json::Texture>> {
        let key = format!(
            "{}:{}",
            raw_textures
                .iter()
                .map(|t| t.map_or_else(|| "-".to_string(), |t| t.to_string()))
                .collect::<Vec<_>>()
                .join(","),
            tag
        );
        if let Some(cached) = self.combine_cache.get(&key) {
            return *cached;
        }
        let result = self.build_combined(gltf, raw_textures, tag, merge, with_alpha);
        self.combine_cache.insert(key, result);
        result
    }

    fn build_combined(
        &mut self,
        gltf: &mut GltfBuilder,
        raw_textures: &[Option<usize>],
        tag: &str,
        merge: PixelMerger<'_>,
        with_alpha: bool,
    ) -> Option<Index<gltf_json::Texture>> {
        let mut merged_name = tag.to_string();
        let mut inputs: Vec<Option<DecodedImage>> = Vec::with_capacity(raw_textures.len());
        let mut size: Option<(u32, u32)> = None;

        for slot in raw_textures {
            let Some(index) = slot else {
                inputs.push(None);
                continue;
            };
            let raw = self.raw;
            let texture = &raw.textures()[*index];
            let decoded = source_path(texture).and_then(|p| match image_utils::decode(&p) {
                Ok(img) => Some(img),
                Err(e) => {
                    gltf.warn(WarningKind::MissingTexture, format!("{:#}", e));
                    None
                }
            });
            if let Some(img) = &decoded {
                merged_name.push('_');
                merged_name.push_str(&texture_base_name(texture));
                match size {
                    None => size = Some((img.width, img.height)),
                    Some((w, h)) if (w, h) != (img.width, img.height) => {
                        gltf.warn(
                            WarningKind::TextureMerge,
                            format!(
                                "Can't merge textures for '{}': {}x{} vs {}x{} ({})",
                                tag, w, h, img.width, img.height, texture.name
                            ),
                        );
                        return None;
                    }
                    Some(_) => {}
                }
            }
            inputs.push(decoded);
        }

        let (width, height) = size?;
        let channels: u8 = if with_alpha { 4 } else { 3 };
        let mut pixels = Vec::with_capacity(width as usize * height as usize * channels as usize);
        let mut samples = vec![[0.0, 0.0, 0.0, 1.0]; inputs.len()];
        for y in 0..height {
            for x in 0..width {
                for (sample, input) in samples.iter_mut().zip(&inputs) {
                    *sample = input.as_ref().map_or([0.0, 0.0, 0.0, 1.0], |img| img.sample(x, y));
                }
                let out = merge(&samples);
                for value in out.iter().take(channels as usize) {
                    pixels.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
                }
            }
        }

        let format = if with_alpha { EncodeFormat::Png } else { EncodeFormat::Jpeg };
        let bytes = match image_utils::encode(format, width, height, channels, &pixels) {
            Ok(bytes) => bytes,
            Err(e) => {
                gltf.warn(WarningKind::TextureEncode, format!("Couldn't encode '{}': {:#}", merged_name, e));
                return None;
            }
        };
        log::debug!("Merged {} ({}x{}, {})", merged_name, width, height, format.mime_type());

        let file_name = format!("{}.{}", merged_name, format.extension());
        let origin = format!("{}:{:?}", tag, raw_textures);
        let image = self.image_from_bytes(gltf, &merged_name, &file_name, &origin, bytes, format.mime_type())?;
        Some(self.push_texture(gltf, &merged_name, image))
    }

    // ========================================================================
    // Image records
    // ========================================================================

    fn image_from_file(
        &mut self,
        gltf: &mut GltfBuilder,
        path: &Path,
        name: &str,
    ) -> Option<Index<gltf_json::Image>> {
        let mime = image_utils::gltf_mime_type(path);

        // glTF only admits PNG and JPEG; anything else is re-encoded
        if mime.is_none() || self.output == ImageOutput::Embedded {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    gltf.warn(WarningKind::MissingTexture, format!("Couldn't read {}: {}", path.display(), e));
                    return None;
                }
            };
            let (bytes, mime) = match mime {
                Some(mime) => (bytes, mime),
                None => match image_utils::reencode_as_png(&bytes) {
                    Ok(png) => (png, EncodeFormat::Png.mime_type()),
                    Err(e) => {
                        gltf.warn(WarningKind::TextureEncode, format!("{}: {:#}", path.display(), e));
                        return None;
                    }
                },
            };
            let file_name = format!("{}.png", name);
            let origin = path.to_string_lossy().to_string();
            return self.image_from_bytes(gltf, name, &file_name, &origin, bytes, mime);
        }
        let mime = mime?;

        match self.output {
            ImageOutput::Binary => {
                let view = gltf.view_for_file(path)?;
                Some(self.push_image(gltf, name, ImageSource::View(view), Some(mime)))
            }
            _ => {
                let wanted = path.file_name()?.to_string_lossy().to_string();
                let file_name = self.claim_file_name(gltf, &wanted, &path.to_string_lossy());
                let dest = self.output_folder.join(&file_name);
                if !same_file(path, &dest) {
                    if let Err(e) = std::fs::copy(path, &dest) {
                        gltf.warn(
                            WarningKind::ResourceWrite,
                            format!("Couldn't copy {} to {}: {}", path.display(), dest.display(), e),
                        );
                    }
                }
                Some(self.push_image(gltf, name, ImageSource::Uri(file_name), Some(mime)))
            }
        }
    }

    fn image_from_bytes(
        &mut self,
        gltf: &mut GltfBuilder,
        name: &str,
        file_name: &str,
        origin: &str,
        bytes: Vec<u8>,
        mime: &'static str,
    ) -> Option<Index<gltf_json::Image>> {
        let source = match self.output {
            ImageOutput::Binary => ImageSource::View(gltf.add_raw_view(&bytes, None)),
            ImageOutput::Embedded => {
                ImageSource::Uri(format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(&bytes)))
            }
            ImageOutput::Folder => {
                let file_name = self.claim_file_name(gltf, file_name, origin);
                let dest = self.output_folder.join(&file_name);
                if let Err(e) = std::fs::write(&dest, &bytes) {
                    gltf.warn(
                        WarningKind::ResourceWrite,
                        format!("Couldn't write {}: {}", dest.display(), e),
                    );
                    return None;
                }
                ImageSource::Uri(file_name)
            }
        };
        Some(self.push_image(gltf, name, source, Some(mime)))
    }

    /// Reserve `wanted` in the output folder for `origin`. A name already
    /// taken by a different source gets a numeric suffix before the
    /// extension.
    fn claim_file_name(&mut self, gltf: &mut GltfBuilder, wanted: &str, origin: &str) -> String {
        let (stem, extension) = match wanted.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (wanted, None),
        };
        let mut candidate = wanted.to_string();
        let mut suffix = 1;
        loop {
            match self.claimed_names.get(&candidate.to_lowercase()) {
                None => {
                    self.claimed_names.insert(candidate.to_lowercase(), origin.to_string());
                    break;
                }
                Some(owner) if owner == origin => break,
                Some(_) => {
                    candidate = match extension {
                        Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
                        None => format!("{}_{}", stem, suffix),
                    };
                    suffix += 1;
                }
            }
        }
        if candidate != wanted {
            gltf.warn(
                WarningKind::FileNameClash,
                format!("{} clashes with another image named {}, writing {}", origin, wanted, candidate),
            );
        }
        candidate
    }

    fn push_image(
        &mut self,
        gltf: &mut GltfBuilder,
        name: &str,
        source: ImageSource,
        mime: Option<&'static str>,
    ) -> Index<gltf_json::Image> {
        let (buffer_view, uri) = match source {
            ImageSource::View(view) => (Some(view), None),
            ImageSource::Uri(uri) => (None, Some(uri)),
        };
        gltf.images.push(gltf_json::Image {
            name: Some(name.to_string()),
            buffer_view,
            // mime type is mandatory for buffer-view images only
            mime_type: buffer_view
                .and(mime)
                .map(|m| gltf_json::image::MimeType(m.to_string())),
            uri,
            extensions: None,
            extras: None,
        });
        Index::new(gltf.images.len() as u32 - 1)
    }

    fn push_texture(
        &mut self,
        gltf: &mut GltfBuilder,
        name: &str,
        image: Index<gltf_json::Image>,
    ) -> Index<gltf_json::Texture> {
        let sampler = self.default_sampler(gltf);
        gltf.textures.push(gltf_json::Texture {
            name: Some(name.to_string()),
            sampler: Some(sampler),
            source: image,
            extensions: None,
            extras: None,
        });
        Index::new(gltf.textures.len() as u32 - 1)
    }

    fn default_sampler(&mut self, gltf: &mut GltfBuilder) -> Index<gltf_json::texture::Sampler> {
        if let Some(sampler) = self.sampler {
            return sampler;
        }
        gltf.samplers.push(gltf_json::texture::Sampler {
            mag_filter: Some(Checked::Valid(gltf_json::texture::MagFilter::Linear)),
            min_filter: Some(Checked::Valid(gltf_json::texture::MinFilter::LinearMipmapLinear)),
            wrap_s: Checked::Valid(gltf_json::texture::WrappingMode::Repeat),
            wrap_t: Checked::Valid(gltf_json::texture::WrappingMode::Repeat),
            ..Default::default()
        });
        let sampler = Index::new(gltf.samplers.len() as u32 - 1);
        self.sampler = Some(sampler);
        sampler
    }
}

enum ImageSource {
    View(Index<gltf_json::buffer::View>),
    Uri(String),
}

/// Resolved location first, then the file name as written in the scene.
fn source_path(texture: &RawTexture) -> Option<PathBuf> {
    [&texture.file_location, &texture.file_name]
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

fn texture_base_name(texture: &RawTexture) -> String {
    let source = if texture.file_name.is_empty() { &texture.name } else { &texture.file_name };
    // scene files may carry either separator
    let file = source.rsplit(['/', '\\']).next().unwrap_or(source);
    Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| texture.name.clone())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

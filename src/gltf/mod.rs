//! glTF 2.0 / GLB output for the scene model.

pub mod assembler;
pub mod buffer;
pub mod compress;
pub mod element;
pub mod error;
pub mod glb;
pub mod material;
pub mod options;
pub mod texture;

pub use assembler::{raw_to_gltf, ModelData};
pub use error::{ConvertError, WarningKind};
pub use options::{CompressionOptions, GltfOptions, UseLongIndices};

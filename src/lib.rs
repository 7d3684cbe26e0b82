pub mod gltf;
pub mod image_utils;
pub mod math;
pub mod raw;

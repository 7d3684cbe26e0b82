use std::path::{Path, PathBuf};

use raw2gltf_lib::gltf::{raw_to_gltf, GltfOptions, UseLongIndices};
use raw2gltf_lib::math::Vec2f;
use raw2gltf_lib::raw::*;

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  raw2gltf <model.json> <output.gltf|output.glb> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --options <file.json>        load GltfOptions, flags below override it");
    eprintln!("  --binary                     write a single .glb");
    eprintln!("  --embed                      inline buffer and images as data: URIs");
    eprintln!("  --keep-attribute <list>      comma-separated: position,normal,tangent,binormal,color,uv0,uv1,auto");
    eprintln!("  --flip-u / --no-flip-v       texture coordinate transforms (V is flipped by default)");
    eprintln!("  --long-indices never|auto|always");
    eprintln!("  --compute-normals never|broken|missing|always");
    eprintln!("  --compress                   EXT_meshopt_compression");
    eprintln!("  --unlit                      KHR_materials_unlit materials");
    eprintln!("  --no-lights                  skip KHR_lights_punctual");
    eprintln!("  --user-properties            copy user properties into extras");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  raw2gltf ./scene.json ./out/scene.gltf");
    eprintln!("  raw2gltf ./scene.json ./out/scene.glb --binary --compress");
    std::process::exit(1);
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("{} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(flag: &str, value: &str) -> T {
    match serde_json::from_value(serde_json::Value::String(value.to_string())) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Unknown value '{}' for {}", value, flag);
            std::process::exit(1);
        }
    }
}

fn keep_mask(list: &str) -> u32 {
    let mut mask = ATTR_JOINT_INDICES | ATTR_JOINT_WEIGHTS;
    for attribute in list.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        mask |= match attribute {
            "position" => ATTR_POSITION,
            "normal" => ATTR_NORMAL,
            "tangent" => ATTR_TANGENT,
            "binormal" => ATTR_BINORMAL,
            "color" => ATTR_COLOR,
            "uv0" => ATTR_UV0,
            "uv1" => ATTR_UV1,
            "auto" => ATTR_AUTO,
            other => {
                eprintln!("Unknown --keep-attribute: {}", other);
                std::process::exit(1);
            }
        };
    }
    mask
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let input = PathBuf::from(&args[1]);
    let output = PathBuf::from(&args[2]);

    let mut options = match args.iter().position(|a| a == "--options") {
        Some(i) => match GltfOptions::from_json_file(Path::new(flag_value(&args, i, "--options"))) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("{:#}", e);
                std::process::exit(1);
            }
        },
        None => GltfOptions::default(),
    };

    let mut flip_u = false;
    let mut flip_v = true;
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--options" => i += 1,
            "--binary" => options.output_binary = true,
            "--embed" => options.embed_resources = true,
            "--long-indices" => {
                options.use_long_indices =
                    parse_enum::<UseLongIndices>("--long-indices", flag_value(&args, i, "--long-indices"));
                i += 1;
            }
            "--compute-normals" => {
                options.compute_normals =
                    parse_enum::<ComputeNormals>("--compute-normals", flag_value(&args, i, "--compute-normals"));
                i += 1;
            }
            "--keep-attribute" => {
                options.keep_attribs = Some(keep_mask(flag_value(&args, i, "--keep-attribute")));
                i += 1;
            }
            "--flip-u" => flip_u = true,
            "--no-flip-v" => flip_v = false,
            "--compress" => options.compression.enabled = true,
            "--unlit" => options.use_khr_mat_unlit = true,
            "--no-lights" => options.use_khr_lights_punctual = false,
            "--user-properties" => options.enable_user_properties = true,
            other => {
                eprintln!("Unknown option '{}'", other);
                usage();
            }
        }
        i += 1;
    }

    if output.extension().is_some_and(|e| e.eq_ignore_ascii_case("glb")) {
        options.output_binary = true;
    }
    let output = output.with_extension(if options.output_binary { "glb" } else { "gltf" });
    if options.output_binary && options.embed_resources {
        eprintln!("Note: ignoring --embed; it's meaningless with --binary.");
    }

    eprintln!("Converting {} ...", input.display());
    let mut raw = match RawModel::load_json(&input) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Load failed: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut transforms: Vec<Box<dyn Fn(Vec2f) -> Vec2f>> = Vec::new();
    if flip_u {
        transforms.push(Box::new(|uv: Vec2f| Vec2f::new(1.0 - uv.x, uv.y)));
    }
    if flip_v {
        transforms.push(Box::new(|uv: Vec2f| Vec2f::new(uv.x, 1.0 - uv.y)));
    }
    if !transforms.is_empty() {
        raw.transform_textures(&transforms);
    }
    raw.condense(options.max_skinning_weights, options.normalize_weights);
    raw.transform_geometry(options.compute_normals);

    let output_folder = output.parent().map(Path::to_path_buf).unwrap_or_default();
    if let Err(e) = std::fs::create_dir_all(&output_folder) {
        eprintln!("Cannot create {}: {}", output_folder.display(), e);
        std::process::exit(1);
    }

    let result = raw_to_gltf(&raw, &options, &output_folder).and_then(|model| {
        model.write(&output)?;
        Ok(model)
    });
    match result {
        Ok(model) => {
            eprintln!("Conversion complete!");
            eprintln!("  Output: {}", output.display());
            eprintln!("  JSON: {} bytes, binary: {} bytes", model.json.len(), model.binary.len());
        }
        Err(e) => {
            eprintln!("Conversion failed: {:?}", e);
            std::process::exit(1);
        }
    }
}

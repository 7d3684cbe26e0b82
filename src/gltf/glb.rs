//! GLB (Binary glTF) container.
//!
//! Layout:
//! - 12-byte file header (magic, version 2, total length)
//! - JSON chunk (type 0x4E4F534A, padded to 4-byte alignment with spaces)
//! - BIN chunk (type 0x004E4942, padded to 4-byte alignment with \0)

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use binrw::{binrw, BinRead, BinWrite};

pub const GLB_MAGIC: u32 = 0x46546C67; // "glTF"
pub const GLB_VERSION: u32 = 2;
pub const GLB_HEADER_SIZE: u32 = 12;
pub const CHUNK_HEADER_SIZE: u32 = 8;
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F534A;
pub const CHUNK_TYPE_BIN: u32 = 0x004E4942;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct GlbHeader {
    #[br(assert(magic == GLB_MAGIC, "not a GLB file (magic {:#010x})", magic))]
    pub magic: u32,
    pub version: u32,
    pub length: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct ChunkHeader {
    pub length: u32,
    pub chunk_type: u32,
}

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Write a GLB stream from a glTF JSON string and binary blob.
pub fn write_glb_to<W: Write + Seek>(w: &mut W, json: &str, bin: &[u8]) -> Result<()> {
    let json_bytes = json.as_bytes();
    let json_padding = padding(json_bytes.len());
    let json_chunk_length = u32::try_from(json_bytes.len() + json_padding)?;

    let bin_padding = padding(bin.len());
    let bin_chunk_length = u32::try_from(bin.len() + bin_padding)?;

    let total_length =
        GLB_HEADER_SIZE + CHUNK_HEADER_SIZE + json_chunk_length + CHUNK_HEADER_SIZE + bin_chunk_length;

    GlbHeader {
        magic: GLB_MAGIC,
        version: GLB_VERSION,
        length: total_length,
    }
    .write(w)?;

    ChunkHeader {
        length: json_chunk_length,
        chunk_type: CHUNK_TYPE_JSON,
    }
    .write(w)?;
    w.write_all(json_bytes)?;
    w.write_all(&b"   "[..json_padding])?;

    ChunkHeader {
        length: bin_chunk_length,
        chunk_type: CHUNK_TYPE_BIN,
    }
    .write(w)?;
    w.write_all(bin)?;
    w.write_all(&[0u8; 3][..bin_padding])?;
    Ok(())
}

/// GLB bytes in memory.
pub fn to_glb(json: &str, bin: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_glb_to(&mut cursor, json, bin)?;
    Ok(cursor.into_inner())
}

/// Write a GLB file from a glTF JSON string and binary blob.
pub fn write_glb(json: &str, bin: &[u8], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("Failed to create GLB: {}", path.display()))?;
    let mut w = std::io::BufWriter::new(file);
    write_glb_to(&mut w, json, bin)?;
    w.flush()?;
    Ok(())
}

/// Split a GLB into its JSON text (padding trimmed) and BIN payload
/// (padding included, as the container stores it). Every declared length
/// is checked against the data.
pub fn parse_glb(data: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut reader = Cursor::new(data);
    let header = GlbHeader::read(&mut reader).context("Failed to read GLB header")?;
    if header.version != GLB_VERSION {
        bail!("Unsupported GLB version {}", header.version);
    }
    if header.length as usize != data.len() {
        bail!("GLB declares {} bytes but holds {}", header.length, data.len());
    }

    let mut json = None;
    let mut bin = Vec::new();
    while (reader.position() as usize) < data.len() {
        let chunk = ChunkHeader::read(&mut reader).context("Failed to read GLB chunk header")?;
        let start = reader.position() as usize;
        let end = start + chunk.length as usize;
        if chunk.length % 4 != 0 {
            bail!("GLB chunk length {} is not 4-byte aligned", chunk.length);
        }
        let payload = data
            .get(start..end)
            .ok_or_else(|| anyhow!("GLB chunk overruns the file ({}..{} of {})", start, end, data.len()))?;
        match chunk.chunk_type {
            CHUNK_TYPE_JSON => {
                let text = std::str::from_utf8(payload).context("GLB JSON chunk is not UTF-8")?;
                json = Some(text.trim_end_matches(' ').to_string());
            }
            CHUNK_TYPE_BIN => bin = payload.to_vec(),
            other => log::debug!("Skipping unknown GLB chunk {:#010x}", other),
        }
        reader.set_position(end as u64);
    }

    let json = json.ok_or_else(|| anyhow!("GLB has no JSON chunk"))?;
    Ok((json, bin))
}

// ============================================================================
// Tests
// ============================================================================

//! Embedded metadata recovery
//!
//! Reads prompt and workflow structures back out of previously saved
//! files, the counterpart to what the save node embeds. Containers are
//! detected from magic bytes rather than file extensions.

use std::path::Path;

use serde_json::Value;

use crate::exif;
use crate::Result;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Metadata recovered from a saved image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveredMetadata {
    pub workflow: Option<Value>,
    pub prompt: Option<Value>,
}

impl RecoveredMetadata {
    /// What a graph editor should load: the full workflow when present,
    /// otherwise the prompt.
    pub fn preferred(&self) -> Option<&Value> {
        self.workflow.as_ref().or(self.prompt.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.workflow.is_none() && self.prompt.is_none()
    }
}

/// Reads embedded metadata from a saved file. Unrecognized containers
/// and unparseable metadata yield an empty result rather than an error.
pub fn read_embedded(path: impl AsRef<Path>) -> Result<RecoveredMetadata> {
    let bytes = std::fs::read(path)?;
    Ok(read_embedded_bytes(&bytes))
}

/// Same as [`read_embedded`], over bytes already in memory.
pub fn read_embedded_bytes(bytes: &[u8]) -> RecoveredMetadata {
    if bytes.starts_with(&PNG_SIGNATURE) {
        from_png(bytes)
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        from_user_comment(exif::extract_from_jpeg(bytes))
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        from_user_comment(exif::extract_from_webp(bytes))
    } else {
        tracing::warn!(
            "Unrecognized image container (first 4 bytes: {:02X?}), nothing to recover",
            &bytes[..bytes.len().min(4)]
        );
        RecoveredMetadata::default()
    }
}

/// Walks PNG chunks looking for `prompt` and `workflow` text entries.
/// Chunk layout: 4-byte big-endian length, 4-byte type, data, CRC.
fn from_png(bytes: &[u8]) -> RecoveredMetadata {
    let mut recovered = RecoveredMetadata::default();
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= bytes.len() {
        let length = u32::from_be_bytes([
            bytes[pos],
            bytes[pos + 1],
            bytes[pos + 2],
            bytes[pos + 3],
        ]) as usize;
        let chunk_type = &bytes[pos + 4..pos + 8];
        if chunk_type == b"IEND" {
            break;
        }
        let data = match bytes.get(pos + 8..pos + 8 + length) {
            Some(data) => data,
            None => break, // length field runs past the file
        };
        match chunk_type {
            b"tEXt" => {
                if let Some((keyword, value)) = parse_text_chunk(data) {
                    assign(&mut recovered, &keyword, &value);
                }
            }
            b"iTXt" => {
                if let Some((keyword, value)) = parse_itxt_chunk(data) {
                    assign(&mut recovered, &keyword, &value);
                }
            }
            _ => {}
        }
        pos += 8 + length + 4; // data plus CRC
    }
    recovered
}

/// tEXt: keyword\0value, both Latin-1.
fn parse_text_chunk(data: &[u8]) -> Option<(String, String)> {
    let (keyword, rest) = split_keyword(data)?;
    Some((keyword, latin1(rest)))
}

/// iTXt: keyword\0compression_flag compression_method language\0
/// translated_keyword\0text. Only uncompressed text is taken.
fn parse_itxt_chunk(data: &[u8]) -> Option<(String, String)> {
    let (keyword, rest) = split_keyword(data)?;
    let compression_flag = *rest.first()?;
    let rest = rest.get(2..)?; // flag and method bytes
    let language_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[language_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    let text = &rest[translated_end + 1..];
    if compression_flag != 0 {
        return None;
    }
    Some((keyword, String::from_utf8_lossy(text).into_owned()))
}

fn split_keyword(data: &[u8]) -> Option<(String, &[u8])> {
    let nul = data.iter().position(|&b| b == 0)?;
    if nul == 0 {
        return None;
    }
    Some((latin1(&data[..nul]), &data[nul + 1..]))
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn assign(recovered: &mut RecoveredMetadata, keyword: &str, value: &str) {
    let parsed: Option<Value> = serde_json::from_str(value).ok();
    if parsed.is_none() {
        return; // non-JSON text entries are not ours
    }
    match keyword {
        "prompt" => recovered.prompt = parsed,
        "workflow" => recovered.workflow = parsed,
        _ => {}
    }
}

/// JPEG and WebP carry one JSON object in the EXIF user comment; its
/// `workflow` and `prompt` keys populate the result.
fn from_user_comment(tiff: Option<Vec<u8>>) -> RecoveredMetadata {
    let mut recovered = RecoveredMetadata::default();
    let comment = tiff.as_deref().and_then(exif::user_comment_from_tiff);
    let parsed = comment.and_then(|c| serde_json::from_str::<Value>(&c).ok());
    if let Some(Value::Object(mut map)) = parsed {
        recovered.workflow = map.remove("workflow");
        recovered.prompt = map.remove("prompt");
    }
    recovered
}

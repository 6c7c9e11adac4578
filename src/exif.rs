//! EXIF user-comment segments
//!
//! A hand-rolled TIFF writer and a lenient reader for the one EXIF
//! entry this node cares about: the UserComment tag carrying workflow
//! JSON. Also the container plumbing to splice the segment into
//! encoded JPEG and WebP streams and to pull it back out.

use crate::{Error, Result};

const USER_COMMENT_TAG: u16 = 0x9286;
const EXIF_IFD_TAG: u16 = 0x8769;

/// EXIF flag bit in the VP8X feature byte.
const VP8X_EXIF_FLAG: u8 = 0x08;

/// APP1 body capacity: the u16 segment length covers itself and the
/// six-byte Exif header.
const APP1_CAPACITY: usize = 0xFFFF - 2 - 6;

/// Builds a minimal little-endian TIFF stream holding the comment as
/// an ASCII UserComment entry directly in IFD0, which is where graph
/// editors look for it.
pub fn user_comment_tiff(comment: &str) -> Vec<u8> {
    let text = comment.as_bytes();
    let count = text.len() as u32 + 1; // NUL terminator counts

    let mut tiff = Vec::with_capacity(26 + text.len() + 1);
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes()); // IFD0 directly after the header
    tiff.extend_from_slice(&1u16.to_le_bytes()); // single entry
    tiff.extend_from_slice(&USER_COMMENT_TAG.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes()); // ASCII
    tiff.extend_from_slice(&count.to_le_bytes());
    if count <= 4 {
        let mut inline = [0u8; 4];
        inline[..text.len()].copy_from_slice(text);
        tiff.extend_from_slice(&inline);
        tiff.extend_from_slice(&0u32.to_le_bytes()); // no next IFD
    } else {
        tiff.extend_from_slice(&26u32.to_le_bytes()); // value follows the IFD
        tiff.extend_from_slice(&0u32.to_le_bytes()); // no next IFD
        tiff.extend_from_slice(text);
        tiff.push(0);
    }
    tiff
}

/// Reads a UserComment back out of a TIFF stream. Lenient where the
/// writer is strict: both byte orders, ASCII and UNDEFINED entries,
/// IFD0 or the Exif sub-IFD.
pub fn user_comment_from_tiff(tiff: &[u8]) -> Option<String> {
    let le = match tiff.get(..2)? {
        b"II" => true,
        b"MM" => false,
        _ => return None,
    };
    if read_u16(tiff, 2, le)? != 42 {
        return None;
    }
    let ifd0 = read_u32(tiff, 4, le)? as usize;
    if let Some(comment) = comment_in_ifd(tiff, ifd0, le) {
        return Some(comment);
    }
    // Most camera-style writers hang the comment off the Exif sub-IFD
    // instead of IFD0.
    let sub = pointer_in_ifd(tiff, ifd0, le, EXIF_IFD_TAG)?;
    comment_in_ifd(tiff, sub as usize, le)
}

fn comment_in_ifd(tiff: &[u8], ifd: usize, le: bool) -> Option<String> {
    let entries = read_u16(tiff, ifd, le)? as usize;
    for i in 0..entries {
        let entry = ifd + 2 + i * 12;
        if read_u16(tiff, entry, le)? != USER_COMMENT_TAG {
            continue;
        }
        let entry_type = read_u16(tiff, entry + 2, le)?;
        let count = read_u32(tiff, entry + 4, le)? as usize;
        let data = entry_data(tiff, entry, le, count)?;
        let text = match entry_type {
            2 => data,
            7 => strip_charset_prefix(data),
            _ => continue,
        };
        let trimmed = trim_trailing_nuls(text);
        return Some(String::from_utf8_lossy(trimmed).into_owned());
    }
    None
}

fn pointer_in_ifd(tiff: &[u8], ifd: usize, le: bool, tag: u16) -> Option<u32> {
    let entries = read_u16(tiff, ifd, le)? as usize;
    for i in 0..entries {
        let entry = ifd + 2 + i * 12;
        if read_u16(tiff, entry, le)? == tag {
            return read_u32(tiff, entry + 8, le);
        }
    }
    None
}

/// Resolves an entry's value bytes: inline in the offset field when the
/// value fits in four bytes, out-of-line otherwise.
fn entry_data(tiff: &[u8], entry: usize, le: bool, count: usize) -> Option<&[u8]> {
    if count <= 4 {
        tiff.get(entry + 8..entry + 8 + count)
    } else {
        let offset = read_u32(tiff, entry + 8, le)? as usize;
        tiff.get(offset..offset + count)
    }
}

/// UNDEFINED UserComment values open with an eight-byte character code.
fn strip_charset_prefix(data: &[u8]) -> &[u8] {
    const PREFIXES: [&[u8; 8]; 4] = [
        b"ASCII\0\0\0",
        b"UNICODE\0",
        b"JIS\0\0\0\0\0",
        b"\0\0\0\0\0\0\0\0",
    ];
    for prefix in PREFIXES {
        if let Some(rest) = data.strip_prefix(prefix.as_slice()) {
            return rest;
        }
    }
    data
}

fn trim_trailing_nuls(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &data[..end]
}

fn read_u16(data: &[u8], pos: usize, le: bool) -> Option<u16> {
    let bytes = data.get(pos..pos + 2)?;
    let arr = [bytes[0], bytes[1]];
    Some(if le {
        u16::from_le_bytes(arr)
    } else {
        u16::from_be_bytes(arr)
    })
}

fn read_u32(data: &[u8], pos: usize, le: bool) -> Option<u32> {
    let bytes = data.get(pos..pos + 4)?;
    let arr = [bytes[0], bytes[1], bytes[2], bytes[3]];
    Some(if le {
        u32::from_le_bytes(arr)
    } else {
        u32::from_be_bytes(arr)
    })
}

/// Splices an APP1/Exif segment directly after the JPEG SOI marker.
pub fn embed_in_jpeg(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
    if jpeg.len() < 2 || jpeg[..2] != [0xFF, 0xD8] {
        return Err(Error::Metadata("not a JPEG stream".to_string()));
    }
    if tiff.len() > APP1_CAPACITY {
        return Err(Error::Metadata(format!(
            "EXIF payload of {} bytes exceeds the APP1 segment capacity",
            tiff.len()
        )));
    }
    let length = (2 + 6 + tiff.len()) as u16;

    let mut out = Vec::with_capacity(jpeg.len() + 4 + length as usize);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

/// Walks JPEG segments and returns the TIFF body of the first
/// APP1/Exif segment, if any.
pub fn extract_from_jpeg(jpeg: &[u8]) -> Option<Vec<u8>> {
    if jpeg.len() < 2 || jpeg[..2] != [0xFF, 0xD8] {
        return None;
    }
    let mut offset = 2;
    while offset + 4 <= jpeg.len() {
        let marker = read_u16(jpeg, offset, false)?;
        if marker == 0xFFD9 || marker & 0xFF00 != 0xFF00 {
            break;
        }
        let length = read_u16(jpeg, offset + 2, false)? as usize;
        if length < 2 {
            break;
        }
        if marker == 0xFFE1 && length > 8 {
            let segment = jpeg.get(offset + 4..offset + 2 + length)?;
            if let Some(tiff) = segment.strip_prefix(b"Exif\0\0") {
                return Some(tiff.to_vec());
            }
        }
        offset += 2 + length;
    }
    None
}

/// Rebuilds a WebP container with an EXIF chunk. A VP8X header is
/// synthesized (with the given canvas size) when the encoder emitted a
/// plain VP8/VP8L file. The EXIF chunk sits ahead of the image data so
/// that chunk walkers that skip RIFF padding bytes still land on it.
pub fn embed_in_webp(webp: &[u8], tiff: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if webp.len() < 12 || &webp[..4] != b"RIFF" || &webp[8..12] != b"WEBP" {
        return Err(Error::Metadata("not a WebP container".to_string()));
    }
    let chunks = parse_riff_chunks(&webp[12..])
        .ok_or_else(|| Error::Metadata("truncated WebP chunk".to_string()))?;
    let first = chunks
        .first()
        .ok_or_else(|| Error::Metadata("WebP container has no chunks".to_string()))?;

    let mut out = Vec::with_capacity(webp.len() + tiff.len() + 32);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&[0u8; 4]); // size patched below
    out.extend_from_slice(b"WEBP");

    if &first.0 == b"VP8X" {
        if first.1.len() < 10 {
            return Err(Error::Metadata("malformed VP8X chunk".to_string()));
        }
        let mut features = first.1.to_vec();
        features[0] |= VP8X_EXIF_FLAG;
        write_chunk(&mut out, b"VP8X", &features);
        write_chunk(&mut out, b"EXIF", tiff);
        for (fourcc, payload) in &chunks[1..] {
            write_chunk(&mut out, fourcc, payload);
        }
    } else {
        write_chunk(&mut out, b"VP8X", &vp8x_payload(width, height, VP8X_EXIF_FLAG)?);
        write_chunk(&mut out, b"EXIF", tiff);
        for (fourcc, payload) in &chunks {
            write_chunk(&mut out, fourcc, payload);
        }
    }

    let riff_size = (out.len() - 8) as u32;
    out[4..8].copy_from_slice(&riff_size.to_le_bytes());
    Ok(out)
}

/// Returns the TIFF body of a WebP EXIF chunk, if any.
pub fn extract_from_webp(webp: &[u8]) -> Option<Vec<u8>> {
    if webp.len() < 12 || &webp[..4] != b"RIFF" || &webp[8..12] != b"WEBP" {
        return None;
    }
    for (fourcc, payload) in parse_riff_chunks(&webp[12..])? {
        if &fourcc == b"EXIF" {
            // Some writers keep the JPEG-style header on the payload.
            let tiff = payload.strip_prefix(b"Exif\0\0").unwrap_or(payload);
            return Some(tiff.to_vec());
        }
    }
    None
}

fn vp8x_payload(width: u32, height: u32, features: u8) -> Result<Vec<u8>> {
    if width == 0 || height == 0 || width > 1 << 24 || height > 1 << 24 {
        return Err(Error::Metadata(format!(
            "canvas {}x{} is outside the WebP range",
            width, height
        )));
    }
    let mut payload = vec![features, 0, 0, 0];
    payload.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    payload.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
    Ok(payload)
}

fn parse_riff_chunks(body: &[u8]) -> Option<Vec<([u8; 4], &[u8])>> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        if body.len() - pos < 8 {
            return None;
        }
        let fourcc = [body[pos], body[pos + 1], body[pos + 2], body[pos + 3]];
        let size = read_u32(body, pos + 4, true)? as usize;
        let payload = body.get(pos + 8..pos + 8 + size)?;
        chunks.push((fourcc, payload));
        pos += 8 + size + (size & 1);
    }
    Some(chunks)
}

fn write_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

// Format sniffing. Distinguishes the binary container from its XML siblings
// (gzip-wrapped, plain, or zlib/raw-DEFLATE wrapped) by magic and leading
// bytes. XML inputs are handed to the heuristic scavenger as plain bytes
// after unwrapping any compression, never to the structured binary parser.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

const BINARY_MAGIC: &[u8] = b"<roblox!";
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Binary,
    GzipXml,
    PlainXml,
    DeflateXml,
}

pub struct DetectedInput<'a> {
    pub format: InputFormat,
    // Unchanged for Binary/PlainXml, decompressed for the wrapped XML variants.
    pub bytes: Cow<'a, [u8]>,
}

pub fn detect(data: &[u8]) -> DetectedInput<'_> {
    if data.starts_with(BINARY_MAGIC) {
        return DetectedInput {
            format: InputFormat::Binary,
            bytes: Cow::Borrowed(data),
        };
    }

    if data.starts_with(&GZIP_MAGIC) {
        if let Some(decoded) = decompress_all(GzDecoder::new(data)) {
            if looks_like_xml(&decoded) {
                return DetectedInput {
                    format: InputFormat::GzipXml,
                    bytes: Cow::Owned(decoded),
                };
            }
        }
    }

    if looks_like_xml(data) {
        return DetectedInput {
            format: InputFormat::PlainXml,
            bytes: Cow::Borrowed(data),
        };
    }

    if let Some(decoded) =
        decompress_all(ZlibDecoder::new(data)).or_else(|| decompress_all(DeflateDecoder::new(data)))
    {
        if looks_like_xml(&decoded) {
            return DetectedInput {
                format: InputFormat::DeflateXml,
                bytes: Cow::Owned(decoded),
            };
        }
    }

    // No XML shape recognized; fall through to the binary path. The structured
    // parser handles BadMagic on its own, and the scavenger works on raw
    // bytes either way.
    DetectedInput {
        format: InputFormat::Binary,
        bytes: Cow::Borrowed(data),
    }
}

fn leading_non_whitespace(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    &data[start..]
}

fn looks_like_xml(bytes: &[u8]) -> bool {
    let leading = leading_non_whitespace(bytes);
    leading.starts_with(b"<?xml") || leading.starts_with(b"<roblox ")
}

fn decompress_all<R: Read>(mut reader: R) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    match reader.read_to_end(&mut out) {
        Ok(_) if !out.is_empty() => Some(out),
        _ => None,
    }
}

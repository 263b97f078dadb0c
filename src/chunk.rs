// Chunk header framing and the gzip/zlib/raw-deflate/raw-bytes decompression
// cascade.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

use crate::reader::ByteReader;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

// Reads a chunk header (u32 length, u32 reserved) plus its payload and
// returns the decompressed bytes. Ok(None) means the chunk is a terminator
// (length == 0) or its declared length overruns the remaining input; the
// caller skips the chunk rather than aborting the whole parse.
pub fn read_chunk(reader: &mut ByteReader) -> crate::error::Result<Option<Vec<u8>>> {
    let length = reader.read_u32_le()?;
    let _reserved = reader.read_u32_le()?;
    if length == 0 {
        return Ok(None);
    }
    let remaining = reader.remaining();
    if length as usize > remaining {
        crate::debug::trace(|| {
            format!("chunk length ({length}) > remaining ({remaining}) - skipping chunk")
        });
        return Ok(None);
    }
    let payload = reader.read_fixed(length as usize)?;
    Ok(Some(decompress(payload)))
}

// Never fails: if none of the known wrappers fit, returns the raw bytes
// unchanged.
pub fn decompress(payload: &[u8]) -> Vec<u8> {
    if payload.starts_with(&GZIP_MAGIC) {
        if let Some(out) = try_read_all(GzDecoder::new(payload)) {
            return out;
        }
    }
    if looks_like_zlib(payload) {
        if let Some(out) = try_read_all(ZlibDecoder::new(payload)) {
            return out;
        }
    }
    if let Some(out) = try_read_all(DeflateDecoder::new(payload)) {
        return out;
    }
    if payload.len() > 2 {
        if let Some(out) = try_read_all(DeflateDecoder::new(&payload[2..])) {
            return out;
        }
    }
    payload.to_vec()
}

fn looks_like_zlib(payload: &[u8]) -> bool {
    // A zlib header is a 16-bit big-endian value whose top byte's low nibble
    // is 8 (DEFLATE) and whose 16-bit value is a multiple of 31.
    if payload.len() < 2 {
        return false;
    }
    let cmf = payload[0];
    let flg = payload[1];
    (cmf & 0x0F) == 8 && (u16::from(cmf) * 256 + u16::from(flg)) % 31 == 0
}

fn try_read_all<R: Read>(mut decoder: R) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) if !out.is_empty() => Some(out),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib_bytes(data: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn decompress_gzip() {
        let payload = gzip_bytes(b"hello chunk");
        assert_eq!(decompress(&payload), b"hello chunk");
    }

    #[test]
    fn decompress_zlib() {
        let payload = zlib_bytes(b"hello zlib chunk");
        assert_eq!(decompress(&payload), b"hello zlib chunk");
    }

    #[test]
    fn decompress_passthrough_on_unknown_wrapper() {
        let payload = b"not compressed at all".to_vec();
        assert_eq!(decompress(&payload), payload);
    }

    #[test]
    fn zero_length_chunk_is_terminator() {
        let header = 0u32.to_le_bytes();
        let reserved = 0u32.to_le_bytes();
        let mut buf = Vec::new();
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&reserved);
        let mut reader = ByteReader::new(&buf);
        assert!(read_chunk(&mut reader).unwrap().is_none());
    }

    #[test]
    fn oversized_length_is_skipped_not_fatal() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_000_000u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        let mut reader = ByteReader::new(&buf);
        assert!(read_chunk(&mut reader).unwrap().is_none());
    }
}

// The 27-tag closed sum type for property values, plus the decoder that
// dispatches on the wire-visible tag byte.

use crate::reader::ByteReader;

pub mod tag {
    pub const STRING: u8 = 1;
    pub const BOOL: u8 = 2;
    pub const INT32: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const DOUBLE: u8 = 5;
    pub const UDIM2: u8 = 6;
    pub const UDIM: u8 = 7;
    pub const RAY: u8 = 8;
    pub const FACES: u8 = 9;
    pub const AXES: u8 = 10;
    pub const BRICK_COLOR: u8 = 11;
    pub const COLOR3: u8 = 12;
    pub const VECTOR2: u8 = 13;
    pub const VECTOR3: u8 = 14;
    pub const VECTOR2_INT16: u8 = 15;
    pub const CFRAME: u8 = 16;
    pub const ENUM: u8 = 17;
    pub const INSTANCE: u8 = 18;
    pub const PROTECTED_STRING: u8 = 19;
    pub const NUMBER_SEQUENCE: u8 = 20;
    pub const COLOR_SEQUENCE: u8 = 21;
    pub const NUMBER_RANGE: u8 = 22;
    pub const RECT: u8 = 23;
    pub const PHYSICAL_PROPERTIES: u8 = 24;
    pub const COLOR3_UINT8: u8 = 25;
    pub const INT64: u8 = 26;
    pub const SHARED_STRING: u8 = 27;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UDim {
    pub scale: f32,
    pub offset: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    Int32(i32),
    Float(f32),
    Double(f64),
    UDim2 { x: UDim, y: UDim },
    UDim(UDim),
    BrickColor(i32),
    Color3([f32; 3]),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector2Int16([i16; 2]),
    CFrame { position: [f32; 3], rotation: [f32; 9] },
    InstanceRef(i32),
    ProtectedString(String),
    NumberRange([f32; 2]),
    Rect([f32; 4]),
    PhysicalProperties([f32; 3]),
    Color3Uint8([f32; 3]),
    Int64(i64),
    SharedString(String),
    // Covers unrecognized tag bytes and the tags this extractor has no
    // specific decoder for (Ray, Faces, Axes, Enum, NumberSequence,
    // ColorSequence).
    Unknown(String),
}

impl PropertyValue {
    pub fn as_script_text(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            PropertyValue::ProtectedString(s) => Some(s),
            PropertyValue::Unknown(s) => Some(s),
            _ => None,
        }
    }
}

// Decodes count values of wire tag value_type from reader, or returns
// Ok(None) so the caller falls back to the unknown-value recovery path.
pub fn decode_known(
    value_type: u8,
    count: usize,
    reader: &mut ByteReader,
    shared_strings: &[String],
) -> crate::error::Result<Option<Vec<PropertyValue>>> {
    use tag::*;

    let values = match value_type {
        STRING => read_each(count, reader, |r| Ok(PropertyValue::String(r.read_string()?)))?,
        BOOL => read_each(count, reader, |r| Ok(PropertyValue::Bool(r.read_bool()?)))?,
        INT32 => read_each(count, reader, |r| Ok(PropertyValue::Int32(r.read_i32_le()?)))?,
        FLOAT => read_each(count, reader, |r| Ok(PropertyValue::Float(r.read_f32_le()?)))?,
        DOUBLE => read_each(count, reader, |r| Ok(PropertyValue::Double(r.read_f64_le()?)))?,
        UDIM => read_each(count, reader, |r| Ok(PropertyValue::UDim(read_udim(r)?)))?,
        UDIM2 => read_each(count, reader, |r| {
            let x = read_udim(r)?;
            let y = read_udim(r)?;
            Ok(PropertyValue::UDim2 { x, y })
        })?,
        BRICK_COLOR => read_each(count, reader, |r| Ok(PropertyValue::BrickColor(r.read_i32_le()?)))?,
        COLOR3 => read_each(count, reader, |r| Ok(PropertyValue::Color3(read_f32_3(r)?)))?,
        VECTOR2 => read_each(count, reader, |r| Ok(PropertyValue::Vector2(read_f32_2(r)?)))?,
        VECTOR3 => read_each(count, reader, |r| Ok(PropertyValue::Vector3(read_f32_3(r)?)))?,
        VECTOR2_INT16 => read_each(count, reader, |r| {
            Ok(PropertyValue::Vector2Int16([r.read_i16_le()?, r.read_i16_le()?]))
        })?,
        CFRAME => read_each(count, reader, |r| {
            let position = read_f32_3(r)?;
            let rotation = r.read_rotation_matrix()?;
            Ok(PropertyValue::CFrame { position, rotation })
        })?,
        INSTANCE => read_each(count, reader, |r| Ok(PropertyValue::InstanceRef(r.read_i32_le()?)))?,
        PROTECTED_STRING => read_each(count, reader, |r| Ok(PropertyValue::ProtectedString(read_protected_string(r)?)))?,
        NUMBER_RANGE => read_each(count, reader, |r| Ok(PropertyValue::NumberRange(read_f32_2(r)?)))?,
        RECT => read_each(count, reader, |r| {
            Ok(PropertyValue::Rect([
                r.read_f32_le()?,
                r.read_f32_le()?,
                r.read_f32_le()?,
                r.read_f32_le()?,
            ]))
        })?,
        PHYSICAL_PROPERTIES => read_each(count, reader, |r| Ok(PropertyValue::PhysicalProperties(read_f32_3(r)?)))?,
        COLOR3_UINT8 => read_each(count, reader, |r| {
            let bytes = [r.read_u8()?, r.read_u8()?, r.read_u8()?];
            Ok(PropertyValue::Color3Uint8([
                f32::from(bytes[0]) / 255.0,
                f32::from(bytes[1]) / 255.0,
                f32::from(bytes[2]) / 255.0,
            ]))
        })?,
        INT64 => read_each(count, reader, |r| {
            let lo = u64::from(r.read_u32_le()?);
            let hi = u64::from(r.read_u32_le()?);
            Ok(PropertyValue::Int64(((hi << 32) | lo) as i64))
        })?,
        SHARED_STRING => read_each(count, reader, |r| {
            let idx = r.read_varint()? as usize;
            let text = shared_strings
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("<shared_string_index:{idx}>"));
            Ok(PropertyValue::SharedString(text))
        })?,
        // Ray, Faces, Axes, Enum, NumberSequence, ColorSequence have no
        // specific decoder here; fall through to unknown-value recovery.
        RAY | FACES | AXES | ENUM | NUMBER_SEQUENCE | COLOR_SEQUENCE => return Ok(None),
        _ => return Ok(None),
    };
    Ok(Some(values))
}

fn read_each(
    count: usize,
    reader: &mut ByteReader,
    mut one: impl FnMut(&mut ByteReader) -> crate::error::Result<PropertyValue>,
) -> crate::error::Result<Vec<PropertyValue>> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(one(reader)?);
    }
    Ok(out)
}

fn read_udim(reader: &mut ByteReader) -> crate::error::Result<UDim> {
    let scale = reader.read_f32_le()?;
    let offset = reader.read_i32_le()?;
    Ok(UDim { scale, offset })
}

fn read_f32_2(reader: &mut ByteReader) -> crate::error::Result<[f32; 2]> {
    Ok([reader.read_f32_le()?, reader.read_f32_le()?])
}

fn read_f32_3(reader: &mut ByteReader) -> crate::error::Result<[f32; 3]> {
    Ok([reader.read_f32_le()?, reader.read_f32_le()?, reader.read_f32_le()?])
}

// Length-prefixed bytes, optionally zlib-compressed, decoded UTF-8-lossy.
fn read_protected_string(reader: &mut ByteReader) -> crate::error::Result<String> {
    let len = reader.read_u32_le()?;
    let bytes = reader.read_fixed(len as usize)?;
    let decompressed = if bytes.starts_with(&[0x78, 0x9C]) {
        zlib_decompress(bytes).unwrap_or_else(|| bytes.to_vec())
    } else if let Some(out) = raw_deflate_decompress(bytes) {
        out
    } else {
        bytes.to_vec()
    };
    Ok(String::from_utf8_lossy(&decompressed).into_owned())
}

fn zlib_decompress(bytes: &[u8]) -> Option<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;
    let mut out = Vec::new();
    ZlibDecoder::new(bytes).read_to_end(&mut out).ok()?;
    Some(out)
}

fn raw_deflate_decompress(bytes: &[u8]) -> Option<Vec<u8>> {
    use flate2::read::DeflateDecoder;
    use std::io::Read;
    let mut out = Vec::new();
    DeflateDecoder::new(bytes).read_to_end(&mut out).ok()?;
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_string_values() {
        let mut buf = Vec::new();
        buf.push(5u8);
        buf.extend_from_slice(b"hello");
        let mut reader = ByteReader::new(&buf);
        let values = decode_known(tag::STRING, 1, &mut reader, &[]).unwrap().unwrap();
        assert_eq!(values, vec![PropertyValue::String("hello".into())]);
    }

    #[test]
    fn unspecified_tag_falls_through() {
        let mut reader = ByteReader::new(&[]);
        assert!(decode_known(tag::ENUM, 1, &mut reader, &[]).unwrap().is_none());
        assert!(decode_known(0xFE, 1, &mut reader, &[]).unwrap().is_none());
    }

    #[test]
    fn shared_string_resolves_by_index() {
        let mut reader = ByteReader::new(&[0]);
        let table = vec!["shared-value".to_string()];
        let values = decode_known(tag::SHARED_STRING, 1, &mut reader, &table)
            .unwrap()
            .unwrap();
        assert_eq!(values, vec![PropertyValue::SharedString("shared-value".into())]);
    }

    #[test]
    fn shared_string_missing_index_is_placeholder() {
        let mut reader = ByteReader::new(&[9]);
        let values = decode_known(tag::SHARED_STRING, 1, &mut reader, &[])
            .unwrap()
            .unwrap();
        assert_eq!(values, vec![PropertyValue::SharedString("<shared_string_index:9>".into())]);
    }

    #[test]
    fn color3uint8_normalizes() {
        let buf = [255u8, 0u8, 128u8];
        let mut reader = ByteReader::new(&buf);
        let values = decode_known(tag::COLOR3_UINT8, 1, &mut reader, &[]).unwrap().unwrap();
        match &values[0] {
            PropertyValue::Color3Uint8([r, g, b]) => {
                assert!((r - 1.0).abs() < 1e-6);
                assert_eq!(*g, 0.0);
                assert!((b - 128.0 / 255.0).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

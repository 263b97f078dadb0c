// Header, class table, chunk loop and the INST/PROP/PRNT/END token stream.
// An error while decoding a token aborts only the current chunk.

use std::collections::HashMap;

use crate::chunk;
use crate::error::{ParseError, Result};
use crate::instance::{Instance, InstanceMap};
use crate::reader::ByteReader;
use crate::value::{self, PropertyValue};

const MAGIC: &[u8; 8] = b"<roblox!";

mod token {
    pub const INST: u8 = 1;
    pub const PROP: u8 = 2;
    pub const PRNT: u8 = 3;
    pub const END: u8 = 4;
}

pub struct ParseResult {
    pub version: u8,
    pub instances: InstanceMap,
    // No token in this format populates the shared-string table, so this is
    // always empty today.
    pub shared_strings: Vec<String>,
}

struct ParserState {
    instances: InstanceMap,
    shared_strings: Vec<String>,
    class_table: Vec<String>,
    // Referents registered so far per class id, in registration order. A
    // PROP token assigns its values positionally against this list.
    class_order: HashMap<u32, Vec<i32>>,
}

pub fn parse(data: &[u8]) -> Result<ParseResult> {
    let mut reader = ByteReader::new(data);

    let magic = reader.read_fixed(MAGIC.len()).map_err(|_| ParseError::BadMagic)?;
    if magic != MAGIC {
        return Err(ParseError::BadMagic);
    }

    let version = reader.read_u8().map_err(|_| ParseError::BadMagic)?;
    let class_count = reader.read_varint().map_err(|_| ParseError::BadMagic)?;
    let _compressed_flag = reader.read_bool().map_err(|_| ParseError::BadMagic)?;

    let class_table = read_class_table(&mut reader, class_count);

    let mut state = ParserState {
        instances: InstanceMap::default(),
        shared_strings: Vec::new(),
        class_table,
        class_order: HashMap::new(),
    };

    loop {
        match chunk::read_chunk(&mut reader) {
            Ok(Some(payload)) => run_chunk(&payload, &mut state),
            Ok(None) => break,
            Err(err) => {
                crate::debug::trace(|| format!("stopping chunk loop: {err}"));
                break;
            }
        }
    }

    Ok(ParseResult {
        version,
        instances: state.instances,
        shared_strings: state.shared_strings,
    })
}

// Any failure abandons the whole table so INST tokens fall back to inline
// class names.
fn read_class_table(reader: &mut ByteReader, class_count: u64) -> Vec<String> {
    if class_count == 0 {
        return Vec::new();
    }
    let mut names = Vec::with_capacity(class_count.min(1 << 20) as usize);
    for _ in 0..class_count {
        match reader.read_string() {
            Ok(name) => names.push(name),
            Err(_) => return Vec::new(),
        }
    }
    names
}

fn run_chunk(payload: &[u8], state: &mut ParserState) {
    let mut reader = ByteReader::new(payload);
    loop {
        if reader.remaining() == 0 {
            break;
        }
        let token = match reader.read_u8() {
            Ok(t) => t,
            Err(_) => break,
        };
        let outcome = match token {
            token::INST => read_inst(&mut reader, state),
            token::PROP => read_prop(&mut reader, state),
            token::PRNT => read_prnt(&mut reader, state),
            token::END => break,
            other => {
                crate::debug::trace(|| format!("unknown token {other:#04x}, ending chunk"));
                break;
            }
        };
        if let Err(err) = outcome {
            crate::debug::trace(|| format!("token read failed, ending chunk: {err}"));
            break;
        }
    }
}

fn read_inst(reader: &mut ByteReader, state: &mut ParserState) -> Result<()> {
    let class_id = reader.read_varint()? as u32;
    let class_name = match state.class_table.get(class_id as usize) {
        Some(name) => name.clone(),
        None => reader.read_string()?,
    };

    if reader.read_bool()? {
        let marker_count = reader.read_u32_le()?;
        for _ in 0..marker_count {
            reader.read_string()?;
        }
    }

    let count = reader.read_u32_le()?;
    let mut referents = Vec::with_capacity(count as usize);
    for _ in 0..count {
        referents.push(reader.read_i32_le()?);
    }

    let order = state.class_order.entry(class_id).or_default();
    for referent in referents {
        state
            .instances
            .instances
            .insert(referent, Instance::new(class_id, class_name.clone(), referent));
        order.push(referent);
    }
    Ok(())
}

fn read_prop(reader: &mut ByteReader, state: &mut ParserState) -> Result<()> {
    let class_id = reader.read_varint()? as u32;
    let property_name = reader.read_string()?;
    let value_type = reader.read_u8()?;

    let referents = state.class_order.get(&class_id).cloned().unwrap_or_default();
    let count = referents.len();
    if count == 0 {
        return Ok(());
    }

    let values = match value::decode_known(value_type, count, reader, &state.shared_strings)? {
        Some(values) => values,
        None => recover_unknown_values(reader, count)?,
    };

    for (referent, property_value) in referents.into_iter().zip(values.into_iter()) {
        if let Some(inst) = state.instances.instances.get_mut(&referent) {
            inst.properties.insert(property_name.clone(), property_value);
        }
    }
    Ok(())
}

fn read_prnt(reader: &mut ByteReader, state: &mut ParserState) -> Result<()> {
    let _version = reader.read_u8()?;
    let count = reader.read_u32_le()?;

    let mut children = Vec::with_capacity(count as usize);
    for _ in 0..count {
        children.push(reader.read_i32_le()?);
    }
    let mut parents = Vec::with_capacity(count as usize);
    for _ in 0..count {
        parents.push(reader.read_i32_le()?);
    }

    for (child, parent) in children.into_iter().zip(parents.into_iter()) {
        if !state.instances.instances.contains_key(&child) {
            continue; // missing referent: drop the edge silently
        }
        if parent == -1 {
            state.instances.roots.push(child);
        } else if state.instances.instances.contains_key(&parent) {
            state.instances.instances.get_mut(&parent).unwrap().children.push(child);
        }
    }
    Ok(())
}

// Tries one varint length applying to every value, falls back to per-value
// u32 lengths, and finally to a literal placeholder.
fn recover_unknown_values(reader: &mut ByteReader, count: usize) -> Result<Vec<PropertyValue>> {
    let start = reader.position();
    if let Ok(length) = reader.read_varint() {
        if length as usize <= reader.remaining() {
            if let Ok(bytes) = reader.read_fixed(length as usize) {
                let text = String::from_utf8_lossy(bytes).into_owned();
                return Ok(vec![PropertyValue::Unknown(text); count]);
            }
        }
    }

    reader.seek(start);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        match read_u32_len_chunk(reader) {
            Some(text) => values.push(PropertyValue::Unknown(text)),
            None => values.push(PropertyValue::Unknown("<unknown>".to_string())),
        }
    }
    Ok(values)
}

fn read_u32_len_chunk(reader: &mut ByteReader) -> Option<String> {
    let len = reader.read_u32_le().ok()?;
    let bytes = reader.read_fixed(len as usize).ok()?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_varint(mut n: u64, out: &mut Vec<u8>) {
        loop {
            let mut byte = (n & 0x7F) as u8;
            n >>= 7;
            if n != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if n == 0 {
                break;
            }
        }
    }

    fn write_string(s: &str, out: &mut Vec<u8>) {
        write_varint(s.len() as u64, out);
        out.extend_from_slice(s.as_bytes());
    }

    fn header(class_names: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(1); // version
        write_varint(class_names.len() as u64, &mut buf);
        buf.push(0); // compressed flag
        for name in class_names {
            write_string(name, &mut buf);
        }
        buf
    }

    fn wrap_chunk(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn terminator() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf
    }

    fn inst_token(class_id: u32, count_and_refs: &[i32]) -> Vec<u8> {
        let mut buf = vec![token::INST];
        write_varint(class_id as u64, &mut buf);
        buf.push(0); // no service markers
        buf.extend_from_slice(&(count_and_refs.len() as u32).to_le_bytes());
        for r in count_and_refs {
            buf.extend_from_slice(&r.to_le_bytes());
        }
        buf
    }

    fn prop_string_token(class_id: u32, name: &str, value: &str) -> Vec<u8> {
        let mut buf = vec![token::PROP];
        write_varint(class_id as u64, &mut buf);
        write_string(name, &mut buf);
        buf.push(value::tag::STRING);
        write_string(value, &mut buf);
        buf
    }

    #[test]
    fn magic_only_file_parses_to_empty_map() {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.push(0);
        data.push(0); // class count varint = 0
        data.push(0); // compressed flag
        let result = parse(&data).unwrap();
        assert!(result.instances.instances.is_empty());
        assert!(result.instances.roots.is_empty());
    }

    #[test]
    fn bad_magic_is_fatal() {
        let data = b"not-roblox-data-at-all!!".to_vec();
        assert!(matches!(parse(&data), Err(ParseError::BadMagic)));
    }

    #[test]
    fn single_instance_with_string_property() {
        let mut data = header(&["Folder"]);
        let mut chunk_payload = Vec::new();
        chunk_payload.extend(inst_token(0, &[10]));
        chunk_payload.extend(prop_string_token(0, "Source", "hello"));
        chunk_payload.push(token::END);
        data.extend(wrap_chunk(&chunk_payload));
        data.extend(terminator());

        let result = parse(&data).unwrap();
        assert_eq!(result.instances.instances.len(), 1);
        let inst = result.instances.get(10).unwrap();
        assert_eq!(
            inst.properties.get("Source"),
            Some(&PropertyValue::String("hello".into()))
        );
    }

    #[test]
    fn unknown_value_type_recovers_and_continues() {
        let mut data = header(&["Folder"]);
        let mut chunk_payload = vec![];
        chunk_payload.extend(inst_token(0, &[1]));
        // PROP with unknown tag 0xFE: varint(5) + "world"
        let mut prop = vec![token::PROP];
        write_varint(0, &mut prop);
        write_string("Mystery", &mut prop);
        prop.push(0xFE);
        write_varint(5, &mut prop);
        prop.extend_from_slice(b"world");
        chunk_payload.extend(prop);
        chunk_payload.push(token::END);
        data.extend(wrap_chunk(&chunk_payload));
        data.extend(terminator());

        let result = parse(&data).unwrap();
        let inst = result.instances.get(1).unwrap();
        assert_eq!(
            inst.properties.get("Mystery"),
            Some(&PropertyValue::Unknown("world".into()))
        );
    }

    #[test]
    fn corrupt_chunk_does_not_prevent_next_chunk() {
        let mut data = header(&["A", "B", "C", "D", "E", "F"]);
        // Chunk 1: truncated garbage that will fail mid-token.
        data.extend(wrap_chunk(&[token::INST, 0xFF, 0xFF]));
        // Chunk 2: a clean instance.
        let mut chunk_payload = inst_token(5, &[42]);
        chunk_payload.push(token::END);
        data.extend(wrap_chunk(&chunk_payload));
        data.extend(terminator());

        let result = parse(&data).unwrap();
        assert!(result.instances.get(42).is_some());
    }

    #[test]
    fn truncated_input_never_panics() {
        let mut full = header(&["Folder"]);
        let mut chunk_payload = inst_token(0, &[1]);
        chunk_payload.extend(prop_string_token(0, "Source", "hello world"));
        chunk_payload.push(token::END);
        full.extend(wrap_chunk(&chunk_payload));
        full.extend(terminator());

        for k in 0..full.len() {
            let _ = parse(&full[..k]);
        }
    }

    #[test]
    fn gzip_wrapped_chunk_parses_identically_to_raw() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut chunk_payload = inst_token(0, &[7]);
        chunk_payload.extend(prop_string_token(0, "Source", "hello world"));
        chunk_payload.push(token::END);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&chunk_payload).unwrap();
        let gzipped = encoder.finish().unwrap();

        let mut data = header(&["Folder"]);
        data.extend_from_slice(&(gzipped.len() as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&gzipped);
        data.extend(terminator());

        let result = parse(&data).unwrap();
        let inst = result.instances.get(7).unwrap();
        assert_eq!(
            inst.properties.get("Source"),
            Some(&PropertyValue::String("hello world".into()))
        );
    }

    #[test]
    fn parent_with_missing_referent_drops_edge() {
        let mut data = header(&["Folder"]);
        let mut chunk_payload = inst_token(0, &[1]);
        chunk_payload.push(token::PRNT);
        chunk_payload.push(0); // version
        chunk_payload.extend_from_slice(&1u32.to_le_bytes());
        chunk_payload.extend_from_slice(&1i32.to_le_bytes()); // child = 1
        chunk_payload.extend_from_slice(&999i32.to_le_bytes()); // parent missing
        chunk_payload.push(token::END);
        data.extend(wrap_chunk(&chunk_payload));
        data.extend(terminator());

        let result = parse(&data).unwrap();
        assert!(result.instances.roots.is_empty());
        assert_eq!(result.instances.get(1).unwrap().children.len(), 0);
    }
}

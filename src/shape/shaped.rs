//! Binary "shaped" document encoding.
//!
//! Every value starts with a tag byte. Containers carry their body length up front so
//! a reader can step over a sibling without decoding it:
//!
//! ```text
//! null    0x00
//! bool    0x01 <u8>
//! number  0x02 <f64 le>
//! string  0x03 <u32 len> <utf8>
//! list    0x04 <u32 body> <u32 count> <value>*
//! array   0x05 <u32 body> <u32 count> (<u32 keylen> <key> <value>)*   keys sorted
//! ```

use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::core::error::{Error, ErrorKind, Result};

pub const TAG_NULL: u8 = 0;
pub const TAG_BOOL: u8 = 1;
pub const TAG_NUMBER: u8 = 2;
pub const TAG_STRING: u8 = 3;
pub const TAG_LIST: u8 = 4;
pub const TAG_ARRAY: u8 = 5;

const CONTAINER_HEADER: usize = 1 + 4 + 4;

/// Shape identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sid(pub u64);

/// A shaped document: its interned shape plus the raw value bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedJson {
    pub sid: Sid,
    pub data: Arc<[u8]>,
}

/// Cached location of one attribute inside a shaped document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapedSub {
    pub sid: Sid,
    pub offset: u32,
    pub length: u32,
}

impl ShapedJson {
    pub fn new(sid: Sid, data: Vec<u8>) -> Self {
        ShapedJson { sid, data: data.into() }
    }

    /// Shaped null with the reserved shape id 0
    pub fn null() -> Self {
        ShapedJson::new(Sid(0), vec![TAG_NULL])
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn sub_bytes(&self, sub: &ShapedSub) -> &[u8] {
        let start = sub.offset as usize;
        let end = start + sub.length as usize;
        self.data.get(start..end).unwrap_or(&[])
    }
}

pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    encode_into(value, &mut out)?;
    Ok(out)
}

fn encode_into(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(*b as u8);
        }
        Value::Number(n) => {
            let mut f = n.as_f64().ok_or_else(|| {
                Error::new(ErrorKind::ShaperFailed, format!("number out of range: {}", n))
            })?;
            // one representation for zero so equal numbers have equal bytes
            if f == 0.0 {
                f = 0.0;
            }
            out.push(TAG_NUMBER);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            put_len(out, s.len())?;
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            let header = begin_container(out, TAG_LIST, items.len())?;
            for item in items {
                encode_into(item, out)?;
            }
            finish_container(out, header)?;
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let header = begin_container(out, TAG_ARRAY, entries.len())?;
            for (key, item) in entries {
                put_len(out, key.len())?;
                out.extend_from_slice(key.as_bytes());
                encode_into(item, out)?;
            }
            finish_container(out, header)?;
        }
    }
    Ok(())
}

fn put_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| Error::new(ErrorKind::ShaperFailed, "value too large to shape"))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn begin_container(out: &mut Vec<u8>, tag: u8, count: usize) -> Result<usize> {
    let header = out.len();
    out.push(tag);
    out.extend_from_slice(&[0; 4]);
    put_len(out, count)?;
    Ok(header)
}

fn finish_container(out: &mut Vec<u8>, header: usize) -> Result<()> {
    let body = out.len() - header - CONTAINER_HEADER;
    let body = u32::try_from(body)
        .map_err(|_| Error::new(ErrorKind::ShaperFailed, "value too large to shape"))?;
    out[header + 1..header + 5].copy_from_slice(&body.to_le_bytes());
    Ok(())
}

fn corrupt(pos: usize) -> Error {
    Error::new(ErrorKind::ShaperFailed, format!("corrupted shaped value at offset {}", pos))
}

pub(crate) fn read_u32(bytes: &[u8], pos: usize) -> Result<u32> {
    let raw = bytes.get(pos..pos + 4).ok_or_else(|| corrupt(pos))?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

pub(crate) fn read_f64(bytes: &[u8], pos: usize) -> Result<f64> {
    let raw = bytes.get(pos..pos + 8).ok_or_else(|| corrupt(pos))?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(raw);
    Ok(f64::from_le_bytes(buf))
}

pub(crate) fn tag_at(bytes: &[u8], pos: usize) -> Result<u8> {
    bytes.get(pos).copied().ok_or_else(|| corrupt(pos))
}

/// Encoded length of the value starting at `pos`
pub fn value_len(bytes: &[u8], pos: usize) -> Result<usize> {
    match tag_at(bytes, pos)? {
        TAG_NULL => Ok(1),
        TAG_BOOL => Ok(2),
        TAG_NUMBER => Ok(9),
        TAG_STRING => Ok(5 + read_u32(bytes, pos + 1)? as usize),
        TAG_LIST | TAG_ARRAY => Ok(CONTAINER_HEADER + read_u32(bytes, pos + 1)? as usize),
        _ => Err(corrupt(pos)),
    }
}

/// Iterates over the members of an array value as `(key, value position)`.
pub(crate) fn array_entries(bytes: &[u8], pos: usize) -> Result<Vec<(&str, usize)>> {
    if tag_at(bytes, pos)? != TAG_ARRAY {
        return Err(corrupt(pos));
    }
    let count = read_u32(bytes, pos + 5)? as usize;
    let mut cursor = pos + CONTAINER_HEADER;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let key_len = read_u32(bytes, cursor)? as usize;
        let key = bytes
            .get(cursor + 4..cursor + 4 + key_len)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .ok_or_else(|| corrupt(cursor))?;
        let value_pos = cursor + 4 + key_len;
        entries.push((key, value_pos));
        cursor = value_pos + value_len(bytes, value_pos)?;
    }
    Ok(entries)
}

/// Positions of the elements of a list value
pub(crate) fn list_elements(bytes: &[u8], pos: usize) -> Result<Vec<usize>> {
    if tag_at(bytes, pos)? != TAG_LIST {
        return Err(corrupt(pos));
    }
    let count = read_u32(bytes, pos + 5)? as usize;
    let mut cursor = pos + CONTAINER_HEADER;
    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        elements.push(cursor);
        cursor += value_len(bytes, cursor)?;
    }
    Ok(elements)
}

/// Finds attribute `name` of the array value at `pos` without decoding siblings.
pub fn find_attribute(bytes: &[u8], pos: usize, name: &str) -> Result<Option<usize>> {
    if tag_at(bytes, pos)? != TAG_ARRAY {
        return Ok(None);
    }
    let count = read_u32(bytes, pos + 5)? as usize;
    let mut cursor = pos + CONTAINER_HEADER;
    for _ in 0..count {
        let key_len = read_u32(bytes, cursor)? as usize;
        let key = bytes.get(cursor + 4..cursor + 4 + key_len).ok_or_else(|| corrupt(cursor))?;
        let value_pos = cursor + 4 + key_len;
        match key.cmp(name.as_bytes()) {
            std::cmp::Ordering::Equal => return Ok(Some(value_pos)),
            // keys are sorted
            std::cmp::Ordering::Greater => return Ok(None),
            std::cmp::Ordering::Less => {}
        }
        cursor = value_pos + value_len(bytes, value_pos)?;
    }
    Ok(None)
}

pub fn decode(bytes: &[u8]) -> Result<Value> {
    decode_at(bytes, 0)
}

pub fn decode_at(bytes: &[u8], pos: usize) -> Result<Value> {
    match tag_at(bytes, pos)? {
        TAG_NULL => Ok(Value::Null),
        TAG_BOOL => Ok(Value::Bool(tag_at(bytes, pos + 1)? != 0)),
        TAG_NUMBER => {
            let f = read_f64(bytes, pos + 1)?;
            Ok(number_value(f))
        }
        TAG_STRING => {
            let len = read_u32(bytes, pos + 1)? as usize;
            let raw = bytes.get(pos + 5..pos + 5 + len).ok_or_else(|| corrupt(pos))?;
            let s = std::str::from_utf8(raw).map_err(|_| corrupt(pos))?;
            Ok(Value::String(s.to_string()))
        }
        TAG_LIST => {
            let items = list_elements(bytes, pos)?
                .into_iter()
                .map(|p| decode_at(bytes, p))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(items))
        }
        TAG_ARRAY => {
            let mut map = Map::new();
            for (key, value_pos) in array_entries(bytes, pos)? {
                map.insert(key.to_string(), decode_at(bytes, value_pos)?);
            }
            Ok(Value::Object(map))
        }
        _ => Err(corrupt(pos)),
    }
}

/// Integral values come back as JSON integers.
fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        return Value::Number(Number::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_document_decodes_back() {
        let doc = json!({"name": "x", "tags": ["a", 1, null], "nested": {"b": true, "a": 2.5}});
        let bytes = encode(&doc).unwrap();
        assert_eq!(decode(&bytes).unwrap(), doc);
        assert_eq!(value_len(&bytes, 0).unwrap(), bytes.len());
    }

    #[test]
    fn attribute_lookup_skips_siblings() {
        let doc = json!({"a": [1, 2, 3], "b": {"c": "deep"}, "z": 1});
        let bytes = encode(&doc).unwrap();
        let b = find_attribute(&bytes, 0, "b").unwrap().unwrap();
        let c = find_attribute(&bytes, b, "c").unwrap().unwrap();
        assert_eq!(decode_at(&bytes, c).unwrap(), json!("deep"));
        assert!(find_attribute(&bytes, 0, "missing").unwrap().is_none());
        assert!(find_attribute(&bytes, c, "x").unwrap().is_none());
    }

    #[test]
    fn zero_has_single_encoding() {
        assert_eq!(encode(&json!(0.0)).unwrap(), encode(&json!(-0.0)).unwrap());
        assert_eq!(encode(&json!(1)).unwrap(), encode(&json!(1.0)).unwrap());
    }
}

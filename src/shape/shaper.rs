use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::core::error::{Error, ErrorKind, Result};
use crate::shape::shaped::{
    self, ShapedJson, ShapedSub, Sid, TAG_ARRAY, TAG_BOOL, TAG_LIST, TAG_NULL, TAG_NUMBER,
    TAG_STRING,
};

/// Attribute path identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u64);

/// Services the index layer needs from the document shaper.
pub trait Shaper: Send + Sync {
    /// Interns a dotted attribute path such as `"address.city"`.
    fn find_or_create_attribute_path_by_name(&self, path: &str) -> Result<Pid>;

    fn lookup_attribute_path_by_pid(&self, pid: Pid) -> Option<String>;

    fn shape_json(&self, value: &Value) -> Result<ShapedJson>;

    /// Locates the sub-value at `pid`, `None` when the document lacks the attribute.
    fn extract_shaped_json(&self, doc: &ShapedJson, pid: Pid) -> Result<Option<ShapedSub>>;

    fn to_json(&self, shaped: &ShapedJson) -> Result<Value>;

    fn sub_to_json(&self, doc: &ShapedJson, sub: &ShapedSub) -> Result<Value> {
        shaped::decode(doc.sub_bytes(sub))
    }
}

/// Shaper interning shapes by structural signature.
///
/// Scalars of one type share a shape, so the shape of a document fixes the shape and
/// presence of every attribute path. Accessors are cached per `(sid, pid)`.
#[derive(Default)]
pub struct VocShaper {
    state: Mutex<ShaperState>,
}

#[derive(Default)]
struct ShaperState {
    shapes: HashMap<String, Sid>,
    paths: HashMap<String, Pid>,
    path_names: Vec<String>,
    accessors: HashMap<(Sid, Pid), Option<Sid>>,
}

impl ShaperState {
    fn intern_shape(&mut self, signature: String) -> Sid {
        // sid 0 is the shaped null constant
        if signature == "n" {
            return Sid(0);
        }
        let next = Sid(self.shapes.len() as u64 + 1);
        *self.shapes.entry(signature).or_insert(next)
    }
}

impl VocShaper {
    pub fn new() -> Self {
        VocShaper::default()
    }

    pub fn shape_count(&self) -> usize {
        self.state.lock().shapes.len()
    }

    fn path_segments(&self, pid: Pid) -> Result<Vec<String>> {
        let name = self.lookup_attribute_path_by_pid(pid).ok_or_else(|| {
            Error::new(ErrorKind::ShaperFailed, format!("unknown attribute path id {}", pid.0))
        })?;
        Ok(name.split('.').map(str::to_string).collect())
    }
}

fn locate(bytes: &[u8], segments: &[String]) -> Result<Option<usize>> {
    let mut pos = 0;
    for segment in segments {
        match shaped::find_attribute(bytes, pos, segment)? {
            Some(next) => pos = next,
            None => return Ok(None),
        }
    }
    Ok(Some(pos))
}

fn signature(bytes: &[u8], pos: usize, out: &mut String) -> Result<()> {
    match shaped::tag_at(bytes, pos)? {
        TAG_NULL => out.push('n'),
        TAG_BOOL => out.push('b'),
        TAG_NUMBER => out.push('d'),
        TAG_STRING => out.push('s'),
        TAG_LIST => out.push('l'),
        TAG_ARRAY => {
            out.push('{');
            for (i, (key, value_pos)) in shaped::array_entries(bytes, pos)?.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(key);
                out.push(':');
                signature(bytes, value_pos, out)?;
            }
            out.push('}');
        }
        tag => {
            return Err(Error::new(ErrorKind::ShaperFailed, format!("unknown tag {}", tag)));
        }
    }
    Ok(())
}

impl Shaper for VocShaper {
    fn find_or_create_attribute_path_by_name(&self, path: &str) -> Result<Pid> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(Error::new(
                ErrorKind::BadParameter,
                format!("invalid attribute path '{}'", path),
            ));
        }
        let mut state = self.state.lock();
        if let Some(pid) = state.paths.get(path) {
            return Ok(*pid);
        }
        state.path_names.push(path.to_string());
        let pid = Pid(state.path_names.len() as u64);
        state.paths.insert(path.to_string(), pid);
        trace!(target: "shaper.path", path, pid = pid.0);
        Ok(pid)
    }

    fn lookup_attribute_path_by_pid(&self, pid: Pid) -> Option<String> {
        let index = (pid.0 as usize).checked_sub(1)?;
        self.state.lock().path_names.get(index).cloned()
    }

    fn shape_json(&self, value: &Value) -> Result<ShapedJson> {
        let data = shaped::encode(value)?;
        let mut sig = String::new();
        signature(&data, 0, &mut sig)?;
        let sid = self.state.lock().intern_shape(sig);
        Ok(ShapedJson::new(sid, data))
    }

    fn extract_shaped_json(&self, doc: &ShapedJson, pid: Pid) -> Result<Option<ShapedSub>> {
        let cached = self.state.lock().accessors.get(&(doc.sid, pid)).copied();
        if let Some(None) = cached {
            return Ok(None);
        }

        let segments = self.path_segments(pid)?;
        let bytes = doc.bytes();
        let Some(pos) = locate(bytes, &segments)? else {
            self.state.lock().accessors.insert((doc.sid, pid), None);
            return Ok(None);
        };
        let length = shaped::value_len(bytes, pos)?;

        let sid = match cached {
            Some(Some(sid)) => sid,
            _ => {
                let mut sig = String::new();
                signature(bytes, pos, &mut sig)?;
                let mut state = self.state.lock();
                let sid = state.intern_shape(sig);
                state.accessors.insert((doc.sid, pid), Some(sid));
                sid
            }
        };

        Ok(Some(ShapedSub {
            sid,
            offset: pos as u32,
            length: length as u32,
        }))
    }

    fn to_json(&self, shaped: &ShapedJson) -> Result<Value> {
        shaped::decode(shaped.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_structures_share_a_shape() {
        let shaper = VocShaper::new();
        let a = shaper.shape_json(&json!({"x": 1, "y": "a"})).unwrap();
        let b = shaper.shape_json(&json!({"y": "bbb", "x": 7})).unwrap();
        let c = shaper.shape_json(&json!({"x": "1"})).unwrap();
        assert_eq!(a.sid, b.sid);
        assert_ne!(a.sid, c.sid);
    }

    #[test]
    fn extracts_nested_attribute() {
        let shaper = VocShaper::new();
        let pid = shaper.find_or_create_attribute_path_by_name("a.b").unwrap();
        assert_eq!(shaper.lookup_attribute_path_by_pid(pid).as_deref(), Some("a.b"));

        let doc = shaper.shape_json(&json!({"a": {"b": [1, 2]}, "c": 0})).unwrap();
        let sub = shaper.extract_shaped_json(&doc, pid).unwrap().unwrap();
        assert_eq!(shaper.sub_to_json(&doc, &sub).unwrap(), json!([1, 2]));

        // second call hits the accessor cache
        let again = shaper.extract_shaped_json(&doc, pid).unwrap().unwrap();
        assert_eq!(sub, again);

        let other = shaper.shape_json(&json!({"a": 5})).unwrap();
        assert!(shaper.extract_shaped_json(&other, pid).unwrap().is_none());
        assert!(shaper.extract_shaped_json(&other, pid).unwrap().is_none());
    }

    #[test]
    fn rejects_empty_path_segments() {
        let shaper = VocShaper::new();
        let err = shaper.find_or_create_attribute_path_by_name("a..b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadParameter);
    }
}

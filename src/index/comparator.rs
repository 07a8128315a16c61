use serde_json::Value;

use crate::index::base::IndexType;
use crate::index::fulltext::normalize_min_length;

/// Decides whether two index descriptions define the same index.
///
/// The types must match, and so must the `unique` flags when they are present.
/// Type specific options are compared next. Finally the field lists: hash indexes
/// ignore the order of their fields, and bitarray indexes compare attribute names
/// only, never their declared value lists.
pub fn index_comparator(lhs: &Value, rhs: &Value) -> bool {
    let (Some(ltype), Some(rtype)) = (lhs.get("type"), rhs.get("type")) else {
        return false;
    };
    if ltype != rtype {
        return false;
    }
    let Some(kind) = ltype.as_str().and_then(IndexType::from_name) else {
        return false;
    };

    if let (Some(Value::Bool(l)), Some(Value::Bool(r))) = (lhs.get("unique"), rhs.get("unique")) {
        if l != r {
            return false;
        }
    }

    let options: &[&str] = match kind {
        IndexType::Geo1 => &["geoJson", "ignoreNull"],
        IndexType::Geo2 => &["ignoreNull"],
        IndexType::Fulltext => &["minLength"],
        IndexType::Cap => &["size", "byteSize"],
        _ => &[],
    };
    for option in options {
        if let (Some(l), Some(r)) = (lhs.get(*option), rhs.get(*option)) {
            let same = match *option {
                "minLength" => same_min_length(l, r),
                _ => same_option(l, r),
            };
            if !same {
                return false;
            }
        }
    }

    let lfields = lhs.get("fields").and_then(Value::as_array);
    let rfields = rhs.get("fields").and_then(Value::as_array);
    let (lfields, rfields) = match (lfields, rfields) {
        (Some(l), Some(r)) => (l, r),
        (None, None) => return true,
        _ => return false,
    };
    if lfields.len() != rfields.len() {
        return false;
    }

    match kind {
        IndexType::Bitarray => lfields
            .iter()
            .zip(rfields)
            .all(|(l, r)| l.get(0).is_some() && l.get(0) == r.get(0)),
        IndexType::Hash => sorted(lfields) == sorted(rfields),
        _ => lfields == rfields,
    }
}

/// Numbers compare by value so `2` and `2.0` agree.
fn same_option(l: &Value, r: &Value) -> bool {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => l == r,
    }
}

/// Requested minimum lengths below 1 all mean 1.
fn same_min_length(l: &Value, r: &Value) -> bool {
    match (l.as_i64(), r.as_i64()) {
        (Some(a), Some(b)) => normalize_min_length(a) == normalize_min_length(b),
        _ => same_option(l, r),
    }
}

fn sorted(fields: &[Value]) -> Vec<String> {
    let mut names: Vec<String> = fields
        .iter()
        .map(|field| field.as_str().map_or_else(|| field.to_string(), str::to_string))
        .collect();
    names.sort();
    names
}

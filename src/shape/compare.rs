use std::cmp::Ordering;

use crate::core::error::Result;
use crate::shape::shaped::{
    TAG_ARRAY, TAG_BOOL, TAG_LIST, TAG_NULL, TAG_NUMBER, TAG_STRING, array_entries, list_elements,
    read_f64, read_u32, tag_at,
};

/// Total order over shaped values, evaluated on the encoded bytes.
///
/// Types order as null < bool < number < string < list < array. Within a type: booleans
/// false first, numbers numerically, strings bytewise, lists element by element then by
/// length, arrays attribute by attribute (name, then value) then by attribute count.
pub fn compare_shaped(left: &[u8], right: &[u8]) -> Ordering {
    compare_at(left, 0, right, 0).unwrap_or_else(|_| left.cmp(right))
}

fn compare_at(left: &[u8], lpos: usize, right: &[u8], rpos: usize) -> Result<Ordering> {
    let ltag = tag_at(left, lpos)?;
    let rtag = tag_at(right, rpos)?;
    if ltag != rtag {
        return Ok(ltag.cmp(&rtag));
    }

    match ltag {
        TAG_NULL => Ok(Ordering::Equal),
        TAG_BOOL => Ok(tag_at(left, lpos + 1)?.cmp(&tag_at(right, rpos + 1)?)),
        TAG_NUMBER => {
            let l = read_f64(left, lpos + 1)?;
            let r = read_f64(right, rpos + 1)?;
            Ok(l.total_cmp(&r))
        }
        TAG_STRING => {
            let l = string_at(left, lpos)?;
            let r = string_at(right, rpos)?;
            Ok(l.cmp(r))
        }
        TAG_LIST => {
            let l = list_elements(left, lpos)?;
            let r = list_elements(right, rpos)?;
            for (lp, rp) in l.iter().zip(r.iter()) {
                let ord = compare_at(left, *lp, right, *rp)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(l.len().cmp(&r.len()))
        }
        TAG_ARRAY => {
            let l = array_entries(left, lpos)?;
            let r = array_entries(right, rpos)?;
            for ((lk, lp), (rk, rp)) in l.iter().zip(r.iter()) {
                let ord = lk.cmp(rk).then(compare_at(left, *lp, right, *rp)?);
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(l.len().cmp(&r.len()))
        }
        _ => Ok(left[lpos..].cmp(&right[rpos..])),
    }
}

fn string_at(bytes: &[u8], pos: usize) -> Result<&[u8]> {
    let len = read_u32(bytes, pos + 1)? as usize;
    Ok(bytes.get(pos + 5..pos + 5 + len).unwrap_or(&[]))
}

/// Orders a sequence of shaped values lexicographically.
pub fn compare_shaped_lists<'a, L, R>(left: L, right: R) -> Ordering
where
    L: IntoIterator<Item = &'a [u8]>,
    R: IntoIterator<Item = &'a [u8]>,
{
    let mut right = right.into_iter();
    for l in left {
        match right.next() {
            Some(r) => {
                let ord = compare_shaped(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            None => return Ordering::Greater,
        }
    }
    if right.next().is_some() {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::shaped::encode;
    use serde_json::{Value, json};

    fn cmp(a: Value, b: Value) -> Ordering {
        compare_shaped(&encode(&a).unwrap(), &encode(&b).unwrap())
    }

    #[test]
    fn type_weights_come_first() {
        assert_eq!(cmp(json!(null), json!(false)), Ordering::Less);
        assert_eq!(cmp(json!(true), json!(-5)), Ordering::Less);
        assert_eq!(cmp(json!(1000), json!("")), Ordering::Less);
        assert_eq!(cmp(json!("zzz"), json!([])), Ordering::Less);
        assert_eq!(cmp(json!([1, 2]), json!({})), Ordering::Less);
    }

    #[test]
    fn values_order_within_type() {
        assert_eq!(cmp(json!(-2.5), json!(1)), Ordering::Less);
        assert_eq!(cmp(json!(3), json!(3.0)), Ordering::Equal);
        assert_eq!(cmp(json!("abc"), json!("abd")), Ordering::Less);
        assert_eq!(cmp(json!([1, 2]), json!([1, 2, 0])), Ordering::Less);
        assert_eq!(cmp(json!({"a": 1}), json!({"a": 2})), Ordering::Less);
        assert_eq!(cmp(json!({"a": 1, "b": 1}), json!({"a": 1})), Ordering::Greater);
    }
}

use std::sync::Arc;

use serde_json::Value;

use crate::core::types::{DocMptr, DocumentRef, Rid};
use crate::core::utils::new_tick;
use crate::shape::shaper::Shaper;

pub(crate) fn make_doc(shaper: &dyn Shaper, key: &str, body: Value) -> DocumentRef {
    let shaped = shaper.shape_json(&body).unwrap();
    Arc::new(DocMptr::new(key.to_string(), Rid(new_tick()), shaped, None, None))
}

use std::fs;
use std::io;

use serde_json::Value;
use tracing::{debug, error};

use crate::core::error::Result;
use crate::core::types::{Cid, Iid};
use crate::index::base::Index;
use crate::storage::layout::{StorageLayout, load_json, save_json};

/// Writes `index-<iid>.json` for the index into its collection directory.
pub fn save_index(layout: &StorageLayout, index: &dyn Index, sync: bool) -> Result<Value> {
    let description = index.json();
    let path = layout.index_path(index.base().cid, index.iid());
    save_json(&path, &description, sync)?;
    debug!(target: "index.persist", path = %path.display(), "saved index description");
    Ok(description)
}

/// Removes the description file. A file that is already gone is not an error.
pub fn remove_index_file(layout: &StorageLayout, cid: Cid, iid: Iid) -> Result<()> {
    let path = layout.index_path(cid, iid);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            error!(target: "index.persist", path = %path.display(), %err, "cannot remove index file");
            Err(err.into())
        }
    }
}

/// All index descriptions of a collection, ordered by index id.
pub fn load_index_files(layout: &StorageLayout, cid: Cid) -> Result<Vec<Value>> {
    layout
        .index_ids(cid)?
        .into_iter()
        .map(|iid| load_json(&layout.index_path(cid, iid)))
        .collect()
}

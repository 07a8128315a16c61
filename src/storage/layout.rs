use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::error;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, Iid};

/// Directory structure of a database
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory, holds LOCK
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(StorageLayout { base_dir })
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join("LOCK")
    }

    pub fn collection_dir(&self, cid: Cid) -> PathBuf {
        self.base_dir.join(format!("collection-{}", cid))
    }

    pub fn parameter_path(&self, cid: Cid) -> PathBuf {
        self.collection_dir(cid).join("parameter.json")
    }

    pub fn index_path(&self, cid: Cid, iid: Iid) -> PathBuf {
        self.collection_dir(cid).join(format!("index-{}.json", iid))
    }

    /// Collection ids found on disk, ascending.
    pub fn collection_ids(&self) -> Result<Vec<Cid>> {
        let mut ids = numbered_entries(&self.base_dir, "collection-", "")?;
        ids.sort_unstable();
        Ok(ids.into_iter().map(Cid).collect())
    }

    /// Index ids with a description file in the collection directory, ascending.
    pub fn index_ids(&self, cid: Cid) -> Result<Vec<Iid>> {
        let mut ids = numbered_entries(&self.collection_dir(cid), "index-", ".json")?;
        ids.sort_unstable();
        Ok(ids.into_iter().map(Iid).collect())
    }
}

fn numbered_entries(dir: &Path, prefix: &str, suffix: &str) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        let id = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
            .and_then(|digits| digits.parse::<u64>().ok());
        if let Some(id) = id {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Writes `value` through a temporary file and renames it into place.
pub fn save_json(path: &Path, value: &Value, sync: bool) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let result = (|| -> Result<()> {
        let mut file = File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.write_all(b"\n")?;
        if sync {
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if let Err(err) = &result {
        error!(target: "storage", path = %path.display(), %err, "cannot save json file");
        let _ = fs::remove_file(&tmp);
    }
    result
}

pub fn load_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Parse, format!("{}: {}", path.display(), err))
    })
}

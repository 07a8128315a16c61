use serde_json::Value;
use tracing::info;

use crate::core::types::{Cid, Iid};

/// Receives index definition changes for replication.
pub trait ReplicationLogger: Send + Sync {
    fn log_create_index(&self, cid: Cid, collection: &str, iid: Iid, description: &Value, server_id: u64);

    fn log_drop_index(&self, cid: Cid, collection: &str, iid: Iid, server_id: u64);
}

/// Writes replication events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReplicationLogger;

impl ReplicationLogger for TracingReplicationLogger {
    fn log_create_index(&self, cid: Cid, collection: &str, iid: Iid, description: &Value, server_id: u64) {
        info!(
            target: "replication",
            cid = cid.0,
            collection,
            iid = iid.0,
            server_id,
            description = %description,
            "index created"
        );
    }

    fn log_drop_index(&self, cid: Cid, collection: &str, iid: Iid, server_id: u64) {
        info!(target: "replication", cid = cid.0, collection, iid = iid.0, server_id, "index dropped");
    }
}

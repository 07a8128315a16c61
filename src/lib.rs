pub mod core;
pub mod memory;
pub mod shape;
pub mod hash;
pub mod analysis;
pub mod index;
pub mod collection;
pub mod transaction;
pub mod aql;
pub mod replication;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use crate::collection::{CollectionHandle, DocumentCollection, UpdatePolicy, Vocbase};
pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::transaction::{AccessType, Transaction, TransactionContext};

/*
┌──────────────────────────────────────── VOCBASE LAYOUT ─────────────────────────────────────┐
│                                                                                              │
│  Vocbase ──owns──> FileLock (LOCK)                                                           │
│     │                                                                                        │
│     ├──owns──> CollectionEnv { Config, VocShaper, MemoryZones, StorageLayout, Replication,   │
│     │                          CollectionNameResolver }                                      │
│     │                                                                                        │
│     └──registers──> CollectionHandle ──shares──> Arc<RwLock<DocumentCollection>>             │
│                                                     │                                        │
│                                                     ├──owns──> PrimaryIndex (HashArray)      │
│                                                     ├──owns──> EdgeIndex (HashArrayMulti)    │
│                                                     ├──owns──> Vec<Box<dyn Index>>           │
│                                                     │            hash / skiplist / fulltext  │
│                                                     │            bitarray / geo / cap        │
│                                                     └──owns──> BarrierList                   │
│                                                                                              │
│  Transaction ──shares──> TransactionState ──holds──> TransactionCollection                   │
│       │                                                 │                                    │
│       │                                                 ├──holds──> ArcRwLock guard          │
│       │                                                 └──records──> Undo log               │
│       └──registered in──> TransactionContext (embedded scopes find the outer state)          │
│                                                                                              │
│  AqlContext ──owns──> NodeArena<Node> + StringArena (charged to the unknown zone)            │
│       ├──owns──> BindParameters, ScopeStack, CollectionRegistry                              │
│       └──opens──> Transaction over the registered collections                                │
│                                                                                              │
│  Every write: barrier ──> primary index ──> secondary indexes in order ──> post-insert hooks │
│  On failure: secondary indexes rolled back newest first ──> primary index                    │
│                                                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/

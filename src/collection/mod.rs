pub mod key;
pub mod document;
pub mod resolver;
pub mod vocbase;

pub use resolver::CollectionNameResolver;
pub use document::{CollectionEnv, CollectionInfo, DocumentCollection, SharedCollection, UpdatePolicy, Written};
pub use vocbase::{CollectionHandle, Vocbase};

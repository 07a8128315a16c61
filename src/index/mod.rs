pub mod base;
pub mod operator;
pub mod comparator;
pub mod primary;
pub mod edge;
pub mod hash_index;
pub mod skiplist;
pub mod fulltext;
pub mod bitarray;
pub mod geo;
pub mod cap;
pub mod factory;
pub mod persist;

pub use base::{Index, IndexBase, IndexType};
pub use factory::{IndexSettings, create_index_from_json};

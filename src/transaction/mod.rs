pub mod collection;
pub mod context;
pub mod single;
pub mod state;
pub mod trx;

pub use collection::AccessType;
pub use context::TransactionContext;
pub use single::SingleCollectionTransaction;
pub use state::{TransactionHints, TransactionOptions, TransactionStatus};
pub use trx::Transaction;

pub mod layout;
pub mod file_lock;

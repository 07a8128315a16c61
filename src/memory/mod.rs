pub mod zone;
pub mod barrier;

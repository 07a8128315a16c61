pub mod shaped;
pub mod shaper;
pub mod compare;

pub mod lowercase;
pub mod length;
pub mod unique;

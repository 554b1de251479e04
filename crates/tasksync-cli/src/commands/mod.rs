pub mod common;
pub mod status;
pub mod sync;

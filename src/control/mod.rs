//! Control module for the patrol robot
pub mod head;

pub use head::HeadTilt;

pub mod detection;
pub mod inference;
pub mod record;
pub mod strategy;

pub use detection::*;
pub use inference::*;
pub use record::*;
pub use strategy::*;

pub mod clock;
pub mod consequence;
pub mod events;
pub mod milestone;
pub mod scope;
pub mod template;
pub mod trigger;
pub mod types;

pub use types::*;

pub(crate) mod events;

pub use events::*;

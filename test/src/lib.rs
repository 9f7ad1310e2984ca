pub mod helpers;
pub mod test_protocol;

pub use helpers::*;
pub use test_protocol::{protocol, Door, Pawn, Pickup};

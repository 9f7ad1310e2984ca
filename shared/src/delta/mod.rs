mod fast_array;
mod net_delta;
mod retirement;

pub use fast_array::{FastArray, FastArrayItem};
pub use net_delta::{DeltaBaseState, NetDeltaSerialize};
pub use retirement::DeltaRetirement;

mod loopback_transport;
mod test_harness;
mod test_resolver;

pub use loopback_transport::{LoopbackTransport, Outgoing};
pub use test_harness::{test_config, Delivery, TestClient, TestHarness};
pub use test_resolver::TestResolver;

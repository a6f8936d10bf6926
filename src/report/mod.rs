pub mod ack;
pub mod emitter;
pub mod events;
pub mod http;
pub mod reporter;
pub mod transport;

pub use reporter::Reporter;

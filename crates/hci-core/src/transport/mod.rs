//! Transport layer module.

pub mod mock;
pub mod serial;
pub mod traits;

pub use mock::MockLink;
pub use serial::SerialPortLink;
pub use traits::{Direction, SerialLink, TransportError};

pub mod frame;
pub mod transport;
pub mod universe;

pub use frame::{blank_frame, Frame};
pub use transport::{DmxTransport, SerialDmxTransport, DMX512_BAUD, DMX512_BREAK_US, DMX512_MAB_US};
pub use universe::Universe;

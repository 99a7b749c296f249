/// Push transport modules
pub mod channel;
pub mod protocol;

pub use channel::{ChannelEvent, ChannelHandle, ConnectionMachine, ConnectionState, Failure, TransportChannel};
pub use protocol::{AckFrame, InboundFrame, Severity};

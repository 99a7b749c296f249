/// MarketSync - real-time sync engine for marketplace messaging
///
/// Keeps a client's view of conversations, unread counters and the
/// notification tray consistent with server state, combining paged snapshot
/// loads with a persistent push channel.

pub mod error;
pub mod config;
pub mod model;
pub mod transport;
pub mod router;
pub mod store;
pub mod ack;
pub mod tray;
pub mod view;
pub mod pager;
pub mod message_view;
pub mod api;
pub mod sinks;
pub mod session;

pub use config::Config;
pub use error::{Result, SyncError};
pub use session::{Collaborators, Input, PageContext, Session};

//! Live price feeds: wire parsing, socket transport, and the reconnecting
//! feed task that turns frames into [`messages::StreamEvent`]s.

pub mod feed;
pub mod messages;
pub mod transport;

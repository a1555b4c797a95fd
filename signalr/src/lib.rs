//! # Box Office SignalR Transport
//!
//! [`HubTransport`](boxoffice_core::HubTransport) implementation speaking the
//! SignalR JSON hub protocol over WebSocket.
//!
//! ## Connection Flow
//!
//! 1. `POST {hub}/negotiate?negotiateVersion=1` (unless
//!    `skip_negotiation` is set), following redirects
//! 2. WebSocket upgrade to `ws(s)://{hub}?id={connectionToken}&access_token={token}`
//! 3. Handshake `{"protocol":"json","version":1}` answered by `{}`
//! 4. Server invocations dispatched to handlers by event name (case-insensitive)
//!
//! Keep-alive pings are sent every `keep_alive_interval` (15s by default).
//! After an unexpected close the connection reconnects on the schedule of
//! the options' [`ReconnectPolicy`](boxoffice_core::ReconnectPolicy), keeping
//! its handlers.

pub mod connection;
pub mod negotiate;
pub mod protocol;
pub mod transport;

pub use connection::{ConnectionState, SignalRConnection};
pub use transport::{SignalRConfig, SignalRTransport};

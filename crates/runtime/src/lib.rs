//! DevTools runtime: browser launch, transport, and connection.
//!
//! This crate is the low-level plumbing for talking to Chrome/Chromium over
//! the DevTools protocol in flat session mode:
//!
//! - **Driver**: locating, launching, and discovering a debuggable browser
//! - **Transport**: WebSocket framing split into reader and writer halves
//! - **Connection**: request/response correlation and event fan-out
//!
//! ```text
//! ┌─────────────┐
//! │  pw-agent   │  Browser / BrowserContext / Page
//! └──────┬──────┘
//! ┌──────▼──────┐
//! │  runtime    │  This crate
//! │  ┌────────┐ │
//! │  │ Conn   │ │  id correlation, sessionId routing, event broadcast
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │ Trans  │ │  WebSocket
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │ Driver │ │  Process management, /json/version
//! │  └────────┘ │
//! └─────────────┘
//! ```

pub mod connection;
pub mod driver;
pub mod error;
pub mod transport;

pub use connection::{Connection, Event, Message, Request, Response};
pub use driver::{BrowserProcess, LaunchOptions, VersionInfo, fetch_version, find_chrome, launch, resolve_ws_endpoint};
pub use error::{Error, Result};
pub use transport::{Transport, TransportParts, TransportReceiver, WebSocketTransport};

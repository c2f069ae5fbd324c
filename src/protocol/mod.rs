//! Host protocol over stdio
//!
//! The host framework drives the provider with one JSON request per line on
//! stdin and reads one JSON response per line from stdout.
//!
//! ```text
//! host ──{"op":"read","record":{...}}──► stdin ─► ProtocolServer ─► InstanceController
//! host ◄──{"status":"present",...}────── stdout ◄─┘
//! ```

pub mod messages;
pub mod server;

pub use messages::{Request, Response};
pub use server::ProtocolServer;

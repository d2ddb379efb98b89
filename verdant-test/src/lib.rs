//! Test doubles for the Verdant client.
//!
//! - [`MockTransport`]: scripted [`Transport`](verdant_http::Transport) with a
//!   call log and gated replies for ordering tests
//! - [`MockUploader`]: in-memory image uploader
//! - [`MockServer`]: the marketplace API as an axum router on an ephemeral port

mod server;
mod transport;
mod uploader;

pub use server::MockServer;
pub use transport::{MockTransport, ResponseGate};
pub use uploader::MockUploader;

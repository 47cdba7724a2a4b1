//! `docqa-server` exposes the `docqa-rag` pipeline over HTTP: ingest plain
//! text, ask grounded questions, count and clear the stored chunks.

pub mod config;
pub mod protocol;
pub mod server;

pub use server::{AppState, ServerConfig, app_router, build_state, run_server};

//! # scalegate-tools
//!
//! MCP (Model Context Protocol) front end for scalegate.
//!
//! [`ScaleToolServer`] publishes `run_api`, `query_api`, `generate_session`,
//! `get_session` and `kill_session` as MCP tools backed by a shared
//! [`ScaleProxy`](scalegate::ScaleProxy). [`serve_stdio`] runs it over
//! stdin/stdout for a parent process such as an agent host.
//!
//! Stdout belongs to the protocol; log to stderr only.

pub mod params;
pub mod server;

pub use params::{KillSessionParams, QueryApiParams, RunApiParams};
pub use server::{ScaleToolServer, serve_stdio};

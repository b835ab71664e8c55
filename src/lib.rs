//! Open Source Advisor
//!
//! A chat API that answers questions about open-source software alternatives
//! by forwarding them to a hosted LLM, together with a fixed instruction
//! document and the running history of the caller's session.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP facade with permissive CORS for a paired front-end
//! - **Advisor**: composes prompts and records successful exchanges
//! - **LLM**: non-streaming `OpenAI`-compatible Chat Completions client
//! - **Sessions**: in-memory, per-session ordered history
//!
//! # Modules
//!
//! - [`advisor`]: question answering and prompt composition
//! - [`config`]: layered configuration (defaults, file, environment, CLI)
//! - [`llm`]: completion client trait and implementations
//! - [`server`]: routes and error mapping
//! - [`session`]: conversation and session management

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::unused_async)]

pub mod advisor;
pub mod config;
pub mod llm;
pub mod server;
pub mod session;

use std::sync::Arc;

use advisor::AdvisorService;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The advisor answering chat requests.
    pub advisor: Arc<AdvisorService>,
}

//! Session and conversation history management.
//!
//! This module provides in-memory session storage keyed by a client-supplied
//! session ID. Each session holds the ordered question/reply history that is
//! resent with every prompt.
//!
//! # Architecture
//!
//! - [`Session`]: a single conversation, with a turn lock that serializes
//!   concurrent questions on the same ID
//! - [`SessionStore`]: thread-safe map of all sessions seen by the process
//!
//! # Example
//!
//! ```rust
//! use open_source_advisor::session::SessionStore;
//!
//! let store = SessionStore::new();
//! let session = store.get_or_create("default");
//! session.record_exchange("Hello!", "Hi, how can I help?");
//!
//! assert_eq!(session.message_count(), 2);
//! assert_eq!(store.list_ids(), vec!["default".to_string()]);
//! ```

mod thread;

pub use thread::{Session, SessionSnapshot, SessionStore, TurnGuard};

//! ui-bridge - lets background callers show HTML windows to the user
//!
//! Callers on any thread submit requests through the [`facade`]; a single
//! [`dispatch`] loop on the UI-owning thread opens the windows through a
//! [`render_host`] and hands each caller exactly one outcome.

pub mod auto_resize;
pub mod config;
pub mod dispatch;
pub mod docs;
pub mod error;
pub mod facade;
pub mod logging;
pub mod mailbox;
pub mod mcp_protocol;
pub mod mcp_server;
pub mod messages;
pub mod outcome;
pub mod render_host;
pub mod reply;
pub mod request;
pub mod settings;
pub mod templates;
pub mod token;

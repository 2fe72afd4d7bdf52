pub mod client;

pub use client::{McpConfig, McpError, McpSession};

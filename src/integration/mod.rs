//! Configuration produced for tools the agent runs alongside.

pub mod mcp;

pub use mcp::{MCP_SERVER_NAME, build_mcp_config, default_server_path};

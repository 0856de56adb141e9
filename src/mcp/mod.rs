//! MCP server for the knowledge base
//!
//! Exposes the query entry point to MCP clients and automation layers.

mod server;

pub use server::run_mcp_server;

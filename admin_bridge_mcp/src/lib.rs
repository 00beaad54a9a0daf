pub mod config;
pub mod mcp_helpers;
pub mod paths;
pub mod providers;

//! JSON-RPC 2.0 tool surface over the retrieval core: `recall`, `store`,
//! `forget`, `update`, `stats`, `list`. See `server` for the dispatch
//! implementation and `config` for environment-driven construction.

mod config;
mod protocol;
mod server;

pub use config::ServerComponents;
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::McpServer;

//! databricks-mcp - Databricks workspace tools for AI agents
//!
//! Exposes catalog browsing, SQL, clusters, jobs, notebooks and DBFS as
//! synchronous tools served over a JSON-RPC stdio protocol. Every remote call
//! goes through the [`dispatch`] module, which drives the async workspace
//! client to completion whether or not the calling thread is already inside
//! an async runtime.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod server;
pub mod sql;
pub mod tools;

pub use dispatch::{DispatchError, Dispatcher, dispatch};
pub use error::{DatabricksMcpError, Result};

//! Phase MCP Library
//!
//! Tracks development sessions through the phases of a workflow
//! (requirements, design, implementation, ...). A session is keyed by
//! project directory and git branch, persisted in SQLite, and answers
//! "what should I do next" with phase instructions plus plan file context.
//!
//! Workflows are YAML state machines: four are built in and a project can
//! supply its own in `.vibe/workflow.yaml`.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use phase_mcp::{PhaseConfig, PhaseMcpServer, EmbeddableMcp};
//!
//! let server = PhaseMcpServer::with_config(PhaseConfig::test_mode())?;
//! server.call_tool("start_development", serde_json::json!({ "workflow": "epcc" })).await?;
//! ```
//!
//! # Usage as Binary
//!
//! Run directly: `phase-mcp`
//!
//! Or configure in `.mcp.json`:
//! ```json
//! { "mcpServers": { "phase": { "command": "./phase-mcp" } } }
//! ```

pub mod catalog;
pub mod composer;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod identity;
pub mod loader;
pub mod params;
pub mod plan;
pub mod server;
pub mod store;
pub mod types;

pub use catalog::WorkflowCatalog;
pub use config::PhaseConfig;
pub use handlers::PhaseService;
pub use server::PhaseMcpServer;
pub use types::{PhaseError, PhaseResult, Session, WorkflowGraph};

// Re-export EmbeddableMcp trait for in-process usage
pub use mcp_common::{EmbeddableError, EmbeddableMcp, EmbeddableResult};

//! Phase MCP - workflow phase tracking for development sessions

use phase_mcp::PhaseMcpServer;
use rmcp::{transport::io::stdio, ServiceExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcp_common::init_tracing("phase_mcp")?;

    tracing::info!("Starting Phase MCP server");

    let server = PhaseMcpServer::new()?;
    let service = server.serve(stdio()).await?;

    tracing::info!("Phase MCP server running");

    service.waiting().await?;

    tracing::info!("Phase MCP server stopped");

    Ok(())
}

//! MCP (Model Context Protocol) client integration.
//!
//! This module provides the tool-host session using the official rmcp SDK.
//! Two transports are supported:
//!
//! - `http://` / `https://` addresses use streamable HTTP. Servers that
//!   only speak the legacy HTTP+SSE transport are not supported.
//! - Anything else is treated as a command line and spawned as a child
//!   process speaking MCP over stdio.
//!
//! # Example
//!
//! ```ignore
//! use runtime::tools::McpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let client = McpClient::connect("http://localhost:8080/mcp").await?;
//!
//! let tools = client.list_tools().await?;
//! for tool in &tools {
//!     println!("Tool: {}", tool.name);
//! }
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, CallToolResult, Tool},
    service::{RoleClient, RunningService},
    transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess},
};
use tokio::process::Command;

/// Error type for MCP operations.
pub type McpError = Box<dyn std::error::Error + Send + Sync>;

/// Where a tool host lives, as given on the command line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Address<'a> {
    Http(&'a str),
    Command { program: &'a str, args: Vec<&'a str> },
}

impl<'a> Address<'a> {
    pub(crate) fn parse(address: &'a str) -> Result<Self, McpError> {
        let address = address.trim();
        if address.starts_with("http://") || address.starts_with("https://") {
            return Ok(Self::Http(address));
        }

        let mut words = address.split_whitespace();
        let program = words.next().ok_or("empty tool host address")?;
        Ok(Self::Command {
            program,
            args: words.collect(),
        })
    }
}

/// An MCP client session.
pub struct McpClient {
    service: RunningService<RoleClient, ()>,
}

impl McpClient {
    /// Connect to a tool host by address.
    pub async fn connect(address: &str) -> Result<Self, McpError> {
        match Address::parse(address)? {
            Address::Http(url) => Self::connect_http(url).await,
            Address::Command { program, args } => Self::spawn(program, args).await,
        }
    }

    /// Connect to a server over streamable HTTP.
    pub async fn connect_http(url: &str) -> Result<Self, McpError> {
        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let service = ().serve(transport).await?;
        tracing::debug!(url, "mcp session initialized over http");

        Ok(Self { service })
    }

    /// Spawn an MCP server and connect to it over stdio.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to run (e.g., "mcp-server-filesystem")
    /// * `args` - Arguments to pass to the command
    pub async fn spawn(
        command: impl AsRef<str>,
        args: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self, McpError> {
        let command_str = command.as_ref().to_string();
        let args_vec: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();

        let transport = TokioChildProcess::new(Command::new(&command_str).configure(|cmd| {
            for arg in &args_vec {
                cmd.arg(arg);
            }
        }))?;

        let service = ().serve(transport).await?;
        tracing::debug!(command = %command_str, "mcp session initialized over stdio");

        Ok(Self { service })
    }

    /// List available tools from the server.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        Ok(self.service.list_all_tools().await?)
    }

    /// Call a tool with the given name and arguments.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, McpError> {
        let params = CallToolRequestParams {
            name: name.into().into(),
            arguments,
            meta: None,
            task: None,
        };

        let result = self.service.call_tool(params).await?;
        Ok(result)
    }

    /// Close the session and terminate the transport.
    pub async fn shutdown(self) -> Result<(), McpError> {
        let reason = self.service.cancel().await?;
        tracing::debug!(?reason, "mcp session closed");
        Ok(())
    }
}

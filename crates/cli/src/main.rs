mod config;
mod error;
mod repl;

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tokio::io::BufReader;
use runtime::{BedrockBackend, McpToolHost, Orchestrator};
use tracing_subscriber::EnvFilter;

use config::{CONFIG_FILE, Config};
use error::Result;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Chat with a Bedrock model that can call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Tool host address: the http(s) URL of an MCP server speaking
    /// streamable HTTP (legacy HTTP+SSE servers are not supported), or a
    /// command line that starts one on stdio
    address: String,

    /// Config file (defaults to ./ferry.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bedrock model ID
    #[arg(long, env = "FERRY_MODEL")]
    model: Option<String>,

    /// AWS region of the Bedrock runtime endpoint
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Tool dispatch rounds allowed per query
    #[arg(long)]
    max_tool_rounds: Option<usize>,

    /// Keep earlier queries and answers in context
    #[arg(long)]
    remember: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Error: failed to load .env: {e}");
        std::process::exit(1);
    }

    let cli = Cli::parse();
    init_tracing();

    // The stdin reader thread cannot be cancelled, so waiting for runtime
    // shutdown could block until the next keypress.
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };
    std::process::exit(code);
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    println!("ferry v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::resolve(cli.config.as_deref())?;
    if cli.config.is_none() && std::path::Path::new(CONFIG_FILE).exists() {
        println!("Config: {CONFIG_FILE}");
    }

    let model = cli.model.unwrap_or(config.backend.model.clone());
    let region = cli.region.unwrap_or(config.backend.region.clone());

    let mut builder = BedrockBackend::builder(config.bearer_token()?, &model)
        .region(region)
        .max_tokens(config.backend.max_tokens)
        .temperature(config.backend.temperature);
    if let Some(endpoint) = &config.backend.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(system) = &config.backend.system {
        builder = builder.system(system);
    }

    let orchestrator = Orchestrator::new(builder.build()?)
        .with_max_tool_rounds(cli.max_tool_rounds.unwrap_or(config.chat.max_tool_rounds));
    let remember = cli.remember || config.chat.remember;
    println!("Model: {model}");

    tracing::info!(address = %cli.address, "connecting to tool host");
    let host = McpToolHost::connect(&cli.address).await?;
    println!("Initialized session with {}", cli.address);

    let input = BufReader::new(tokio::io::stdin());
    let stdout = io::stdout();
    let turns = repl::run_session(
        &orchestrator,
        host,
        remember,
        input,
        stdout.lock(),
        interrupted(),
    )
    .await?;

    tracing::info!(turns, "session ended");
    println!("\nSession ended.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn address_is_required() {
        let err = Cli::try_parse_from(["ferry"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn parses_address_and_options() {
        let cli = Cli::try_parse_from([
            "ferry",
            "--remember",
            "--max-tool-rounds",
            "3",
            "-c",
            "alt.toml",
            "npx -y server-filesystem /tmp",
        ])
        .unwrap();

        assert_eq!(cli.address, "npx -y server-filesystem /tmp");
        assert!(cli.remember);
        assert_eq!(cli.max_tool_rounds, Some(3));
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }

    #[test]
    fn options_default_to_unset() {
        let cli = Cli::try_parse_from(["ferry", "http://localhost:8080/mcp"]).unwrap();

        assert_eq!(cli.address, "http://localhost:8080/mcp");
        assert!(!cli.remember);
        assert_eq!(cli.max_tool_rounds, None);
        assert_eq!(cli.config, None);
    }
}

//! ConfluenceKit CLI - Command-line access and MCP server for Confluence

mod mcp;

use clap::{Parser, Subcommand};
use confluencekit::{
    ApiClient, ApiTokenAuth, AuthStrategy, ClientConfig, ConfluenceError, Credentials,
    ErrorPayload, GetChildPagesRequest, GetPageContentRequest, QueryOperations,
    SearchPagesRequest, Toolkit, DEFAULT_CHILDREN_LIMIT, DEFAULT_SEARCH_LIMIT, TOOL_LLMTXT,
};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// ConfluenceKit - AI-friendly Confluence access
#[derive(Parser, Debug)]
#[command(name = "confluencekit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print full help with examples (llmtxt)
    #[arg(long)]
    llmtxt: bool,

    /// Confluence base URL, e.g. https://example.atlassian.net/wiki
    #[arg(long, env = "ATLASSIAN_URL", global = true)]
    url: Option<String>,

    /// Account email for API token authentication
    #[arg(long, env = "ATLASSIAN_USER_EMAIL", global = true)]
    email: Option<String>,

    /// Atlassian API token
    #[arg(long, env = "ATLASSIAN_API_TOKEN", global = true, hide_env_values = true)]
    api_token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "CONFLUENCE_TIMEOUT_SECS", global = true, default_value_t = 30)]
    timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as MCP (Model Context Protocol) server over stdio
    Mcp,
    /// Search pages with a CQL query
    Search {
        /// CQL query, e.g. "type=page AND space=DOCS"
        cql: String,

        /// Maximum number of results (clamped to 1-100)
        #[arg(long, short, default_value_t = DEFAULT_SEARCH_LIMIT as i64)]
        limit: i64,
    },
    /// Fetch a page body with metadata
    Page {
        /// Page id
        id: String,

        /// Output format: markdown or html
        #[arg(long, short, default_value = "markdown")]
        format: String,
    },
    /// List the direct children of a page
    Children {
        /// Parent page id
        id: String,

        /// Maximum number of children (clamped to 1-100)
        #[arg(long, short, default_value_t = DEFAULT_CHILDREN_LIMIT as i64)]
        limit: i64,
    },
    /// Check the configured credentials
    Verify,
}

/// Connected toolkit plus the auth strategy it signs requests with
struct Connection {
    toolkit: Toolkit,
    auth: ApiTokenAuth,
    base_url: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results and MCP traffic
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if cli.llmtxt {
        writeln_safe(TOOL_LLMTXT);
        std::process::exit(0);
    }

    let Some(command) = cli.command.as_ref() else {
        eprintln!("Usage: confluencekit search <CQL>");
        eprintln!("   or: confluencekit page <ID>");
        eprintln!("   or: confluencekit children <ID>");
        eprintln!("   or: confluencekit mcp");
        eprintln!("   or: confluencekit --help");
        std::process::exit(1);
    };

    let connection = match connect(&cli) {
        Ok(connection) => connection,
        Err(e) => exit_with_error(&e),
    };

    match command {
        Commands::Mcp => mcp::run_server(connection.toolkit).await,
        Commands::Search { cql, limit } => {
            let request = SearchPagesRequest::new(cql.as_str()).limit(*limit);
            print_result(connection.toolkit.search_pages(request).await);
        }
        Commands::Page { id, format } => {
            let request = GetPageContentRequest {
                page_id: id.clone(),
                output_format: Some(format.clone()),
            };
            print_result(connection.toolkit.get_page_content(request).await);
        }
        Commands::Children { id, limit } => {
            let request = GetChildPagesRequest::new(id.as_str()).limit(*limit);
            print_result(connection.toolkit.get_child_pages(request).await);
        }
        Commands::Verify => {
            let result = connection.auth.verify().await.map(|()| {
                serde_json::json!({
                    "status": "ok",
                    "base_url": connection.base_url,
                })
            });
            print_result(result);
        }
    }
}

/// Build the client stack from flags and environment
fn connect(cli: &Cli) -> Result<Connection, ConfluenceError> {
    let url = cli
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ConfluenceError::Configuration("ATLASSIAN_URL is required".to_string()))?;

    let config = ClientConfig::new(url)?.timeout(Duration::from_secs(cli.timeout.max(1)));

    let credentials = Credentials::new(
        cli.email.clone().unwrap_or_default(),
        cli.api_token.clone().unwrap_or_default(),
    );
    let auth = ApiTokenAuth::new(credentials)?;
    let client = ApiClient::new(config, Arc::new(auth.clone()))?;
    let auth = auth.with_client(&client);
    let base_url = client.base_url().to_string();

    Ok(Connection {
        toolkit: Toolkit::new(QueryOperations::new(client)),
        auth,
        base_url,
    })
}

fn print_result<T: Serialize>(result: Result<T, ConfluenceError>) {
    match result {
        Ok(value) => {
            let json = serde_json::to_string_pretty(&value).unwrap_or_else(|e| {
                eprintln!("Error serializing response: {}", e);
                std::process::exit(1);
            });
            writeln_safe(&json);
        }
        Err(e) => exit_with_error(&e),
    }
}

/// Error payload as printed on stderr
fn format_error(err: &ConfluenceError) -> String {
    let payload = ErrorPayload::from(err);
    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| format!("Error: {}", err))
}

fn exit_with_error(err: &ConfluenceError) -> ! {
    eprintln!("{}", format_error(err));
    std::process::exit(1);
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

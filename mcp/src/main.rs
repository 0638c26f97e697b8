use std::time::Duration;

use arc_mcp_runtime::{DateLiteralStyle, McpCommands, RuntimeConfig, Transport, run};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "arc-mcp",
    version,
    about = "MCP server for the CData Arc Admin API"
)]
struct Cli {
    /// Arc Admin API base URL
    #[arg(
        long,
        global = true,
        env = "ARC_BASE_URL",
        default_value = "http://localhost:8080/api.rsc"
    )]
    base_url: String,

    /// Arc auth token, or user:password for Basic auth
    #[arg(long, global = true, env = "ARC_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "ARC_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// How datetime literals are written in $filter (bare or quoted)
    #[arg(
        long,
        global = true,
        env = "ARC_DATETIME_FILTER_STYLE",
        default_value = "bare"
    )]
    datetime_filter_style: DateLiteralStyle,

    #[arg(long, global = true, env = "ARC_TRANSPORT", value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Port for the HTTP health transport
    #[arg(long, global = true, env = "ARC_HTTP_PORT", default_value_t = 3000)]
    port: u16,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "ARC_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<McpCommands>,
}

fn init_tracing(json: bool) {
    // stdout carries protocol frames; logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "arc_mcp=info,arc_mcp_runtime=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = RuntimeConfig {
        base_url: cli.base_url,
        auth_token: cli.auth_token,
        timeout: Duration::from_secs(cli.timeout_secs.max(1)),
        date_style: cli.datetime_filter_style,
        transport: cli.transport,
        port: cli.port,
    };
    let code = run(config, cli.command.unwrap_or(McpCommands::Serve)).await;
    std::process::exit(code);
}

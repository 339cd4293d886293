use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use ui_bridge::config::{self, RendererConfig};
use ui_bridge::dispatch::{DispatchLoop, DispatchSettings};
use ui_bridge::facade::RequestFacade;
use ui_bridge::logging;
use ui_bridge::mailbox::mailbox;
use ui_bridge::mcp_server::McpServer;
use ui_bridge::render_host::StdioRenderHost;
use ui_bridge::settings::KeyringSettingsStore;
use ui_bridge::token::TokenIdentity;

#[derive(Parser, Debug)]
#[command(version, about = "Show HTML windows to the user on behalf of MCP callers")]
struct Args {
    /// Config file (default: ~/.ui-bridge/config.json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port for the MCP HTTP server
    #[arg(long)]
    port: Option<u16>,

    /// Renderer executable; overrides the configured renderer
    #[arg(long, value_name = "COMMAND")]
    renderer: Option<String>,

    /// Extra arguments passed to --renderer
    #[arg(long = "renderer-arg", value_name = "ARG", requires = "renderer")]
    renderer_args: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(command) = args.renderer {
        config.renderer = Some(RendererConfig {
            command,
            args: args.renderer_args,
        });
    }

    let _log_guard = logging::init(&config.log_dir());
    info!(
        port = config.port,
        data_dir = %config.data_dir().display(),
        "Starting ui-bridge"
    );

    let renderer = config
        .renderer
        .clone()
        .context("No renderer configured; pass --renderer or set \"renderer\" in the config file")?;

    let data_dir = config.data_dir();
    let identity = TokenIdentity::load(&data_dir).context("Failed to load installation identity")?;
    let settings = Arc::new(KeyringSettingsStore::new(config.keyring_service.clone()));

    let (tx, rx) = mailbox();
    let host = StdioRenderHost::spawn(&renderer, tx.event_sink())
        .with_context(|| format!("Failed to start renderer '{}'", renderer.command))?;

    let facade = Arc::new(RequestFacade::new(tx, identity, settings, config.clone()));
    let server = McpServer::new(config.port, data_dir, facade)?;
    let server_handle = server.start()?;
    info!(url = %server.url(), "MCP server listening");

    // The dispatch loop owns this thread until shutdown
    DispatchLoop::new(rx, host, DispatchSettings::from_config(&config)).run();

    server_handle.stop();
    info!("ui-bridge stopped");
    Ok(())
}

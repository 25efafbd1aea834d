use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use prompter_hub::{ControlEvent, HubConfig, client, server};

#[derive(Parser)]
#[command(name = "prompter-hub")]
#[command(about = "Real-time hub for teleprompter scripts: SSE remote control and WebSocket live preview", version)]
#[command(after_help = "Endpoints:
  GET  /api/scripts/<name>/events    server-sent control events for a script
  POST /api/scripts/<name>/control   publish a control event ({\"type\": ...})
  GET  /api/scripts/<name>/ws        live preview relay between editors
  GET  /api/version                  server version")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hub server
    Serve {
        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Publish `reload` when a script in this directory changes
        #[arg(short, long, value_name = "DIR")]
        scripts_dir: Option<PathBuf>,

        /// Relay live preview messages back to their sender too
        #[arg(long)]
        echo: bool,
    },

    /// Send a control event to a running hub
    Control {
        /// Script name (topic)
        script: String,

        #[command(subcommand)]
        action: Action,

        #[arg(long, default_value = "http://localhost:3030", env = "PROMPTER_SERVER")]
        server: String,
    },
}

#[derive(Subcommand)]
enum Action {
    /// Advance to the next block
    Next,
    /// Go back one block
    Prev,
    /// Return to the first block
    Reset,
    /// Ask viewers to refetch the script
    Reload,
    /// Jump to a block
    Goto { index: u64 },
    /// Switch focus mode
    Focus {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Send an arbitrary JSON payload
    Raw { json: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Action {
    fn into_payload(self) -> Result<serde_json::Value> {
        let event = match self {
            Action::Next => ControlEvent::Next,
            Action::Prev => ControlEvent::Prev,
            Action::Reset => ControlEvent::Reset,
            Action::Reload => ControlEvent::Reload,
            Action::Goto { index } => ControlEvent::Goto { index },
            Action::Focus { state } => ControlEvent::Focus {
                enabled: matches!(state, Toggle::On),
            },
            Action::Raw { json } => return Ok(serde_json::from_str(&json)?),
        };
        Ok(event.to_value())
    }
}

fn init_logging(config: &HubConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("prompter_hub=info,tower_http=info"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "prompter-hub.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Serve {
        config: None,
        port: None,
        host: None,
        scripts_dir: None,
        echo: false,
    });

    match command {
        Commands::Serve {
            config,
            port,
            host,
            scripts_dir,
            echo,
        } => {
            let mut config = HubConfig::load(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if scripts_dir.is_some() {
                config.scripts_dir = scripts_dir;
            }
            config.echo_to_sender |= echo;

            let _guard = init_logging(&config)?;

            println!(
                "{} Teleprompter hub running at {}",
                "✓".green(),
                config.display_url().bright_blue()
            );
            if let Some(dir) = &config.scripts_dir {
                println!("{} Watching scripts in {}", "→".bright_blue(), dir.display().to_string().bright_yellow());
            }

            server::start(config).await?;
        }

        Commands::Control {
            script,
            action,
            server,
        } => {
            let payload = action.into_payload()?;
            client::send_control(&server, &script, &payload).await?;
            println!(
                "{} Sent {} to {}",
                "✓".green(),
                payload.to_string().bright_white(),
                script.bright_yellow()
            );
        }
    }

    Ok(())
}

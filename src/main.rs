use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use runslot::client::ControlClient;
use runslot::config::{ServerConfig, DEFAULT_RETAIN, DEFAULT_SOCKET_PATH};
use runslot::protocol::Response;
use runslot::server::Server;
use runslot::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "runslot")]
#[command(version)]
#[command(about = "Single-slot command execution daemon")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the runslot daemon
    Server(ServerArgs),

    /// Start a command in the daemon's running slot
    Run {
        #[command(flatten)]
        client: ClientArgs,

        /// Command and arguments to execute
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },

    /// Ask the currently running job to terminate
    Kill {
        #[command(flatten)]
        client: ClientArgs,

        /// Id of the running job
        id: String,
    },

    /// Fetch a job's captured output
    Log {
        #[command(flatten)]
        client: ClientArgs,

        /// Job id
        id: String,

        /// Byte offset to start from
        offset: Option<u64>,
    },

    /// Report daemon readiness, or metadata for one job
    Status {
        #[command(flatten)]
        client: ClientArgs,

        /// Job id (omit to query the daemon itself)
        id: Option<String>,
    },

    /// List the retained job ids, oldest first
    Recent {
        #[command(flatten)]
        client: ClientArgs,
    },
}

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Socket path to bind
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// How many recent jobs to retain, the running one included
    #[arg(long, default_value_t = DEFAULT_RETAIN)]
    retain: usize,
}

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Socket path of the daemon
    #[arg(long, short = 's', default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize)]
struct ReplyOutput {
    status: u16,
    message: String,
    body: String,
}

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::new(args.socket.clone()).with_retain(args.retain);
    let server = Server::bind(config)?;
    let shutdown = install_shutdown_handler();

    tokio::select! {
        _ = server.run() => {}
        _ = shutdown.cancelled() => {}
    }

    let _ = std::fs::remove_file(&args.socket);
    Ok(())
}

async fn send_request(
    client: ClientArgs,
    fields: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reply = ControlClient::connect(&client.socket)
        .await?
        .send(&fields)
        .await?;

    render_reply(&client.output, &reply)?;
    if reply.status >= 400 {
        std::process::exit(1);
    }
    Ok(())
}

fn render_reply(
    format: &OutputFormat,
    reply: &Response,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Table => {
            println!("{:03} {}", reply.status, reply.message);
            if !reply.body.is_empty() {
                print!("{}", String::from_utf8_lossy(&reply.body));
                if reply.body.last() != Some(&b'\n') {
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            let out = ReplyOutput {
                status: reply.status,
                message: reply.message.clone(),
                body: String::from_utf8_lossy(&reply.body).into_owned(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await,
        Commands::Run { client, argv } => {
            let mut fields = vec!["run".to_string()];
            fields.extend(argv);
            send_request(client, fields).await
        }
        Commands::Kill { client, id } => {
            send_request(client, vec!["kill".to_string(), id]).await
        }
        Commands::Log { client, id, offset } => {
            let mut fields = vec!["log".to_string(), id];
            if let Some(offset) = offset {
                fields.push(offset.to_string());
            }
            send_request(client, fields).await
        }
        Commands::Status { client, id } => {
            let mut fields = vec!["status".to_string()];
            fields.extend(id);
            send_request(client, fields).await
        }
        Commands::Recent { client } => send_request(client, vec!["recent".to_string()]).await,
    }
}

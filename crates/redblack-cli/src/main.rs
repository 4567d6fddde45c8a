//! redblack: red/black deployment of a machine image.
//!
//! # Usage
//!
//! ```text
//! redblack deploy ami-0abc123 --requester alice
//! redblack --json plan ami-0abc123
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "redblack",
    about = "Red/black deployment of machine images onto autoscaling clusters",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, global = true, default_value = "redblack.toml")]
    config: PathBuf,

    /// Emit logs and results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace every cluster serving the image's identity with a new group
    /// running the image.
    Deploy {
        /// Image to deploy.
        image: String,
        /// Who asked for the deployment; recorded in logs.
        #[arg(long)]
        requester: Option<String>,
        /// Account profile to use instead of the image's deployment.
        #[arg(long)]
        profile: Option<String>,
    },
    /// Show the identity and the groups a deployment would replace.
    Plan {
        image: String,
        #[arg(long)]
        profile: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Command::Deploy {
            image,
            requester,
            profile,
        } => {
            let ctx = commands::context(&image, requester, profile);
            commands::deploy::run(&cli.config, &ctx, cli.json).await
        }
        Command::Plan { image, profile } => {
            let ctx = commands::context(&image, None, profile);
            commands::plan::run(&cli.config, &ctx, cli.json).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,redblack=debug"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

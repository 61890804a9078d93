use std::error::Error;

use clap::{Parser, Subcommand};
use gamemaster_runner::Clerk;
use gamemaster_runner::logging::init_logging;

#[derive(Parser)]
#[command(name = "gmctl")]
#[command(version = env!("VERSION_STRING"), about = "Control a running gm-server")]
pub struct Args {
    /// Server control-plane address
    #[arg(short, long, default_value = "127.0.0.1:11112")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start operating a game
    Attach {
        /// Game contract address
        resource_id: String,
    },
    /// Stop operating a game
    Detach {
        /// Game contract address
        resource_id: String,
    },
    /// Check that the server answers
    Echo { message: String },
    /// Show every operated game
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let _guard = init_logging("gmctl", false)?;

    let clerk = Clerk::connect(args.server.as_str()).await?;

    match args.command {
        Command::Attach { resource_id } => {
            clerk.attach(resource_id.as_str()).await?;
            println!("attached {}", resource_id);
        }
        Command::Detach { resource_id } => {
            clerk.detach(resource_id.as_str()).await?;
            println!("detached {}", resource_id);
        }
        Command::Echo { message } => {
            println!("{}", clerk.echo(message).await?);
        }
        Command::List => {
            let resources = clerk.list().await?;
            if resources.is_empty() {
                println!("no games operated");
            }
            for status in resources {
                println!(
                    "{}\tstate={}\tticks={}\tforced={}\tfailures={}",
                    status.resource_id,
                    status.last_state.as_deref().unwrap_or("-"),
                    status.ticks,
                    status.forced,
                    status.failures
                );
            }
        }
    }

    Ok(())
}

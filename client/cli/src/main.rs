use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;

use api::{ItemError, RestClient};
use config::Config;

#[derive(Parser)]
#[command(name = "stow")]
#[command(about = "Stowage storage admin client", long_about = None)]
struct Cli {
    /// Server URL, overriding the saved one
    #[arg(long, global = true)]
    server: Option<String>,
    /// Access token, overriding the saved one
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save server URL and access token
    Login,
    /// Copy a file
    Cp { source: String, dest: String },
    /// Move a file
    Mv { source: String, dest: String },
    /// Rename a file in place
    Rename { source: String, new_name: String },
    /// Move a folder under another folder
    Mvdir {
        source: String,
        /// Parent folder that receives the moved folder
        dest_parent: String,
    },
    /// Rename a folder in place
    Renamedir { source: String, new_name: String },
    /// Create an empty folder
    Mkdir { path: String },
    /// Delete a file, or a whole folder with --folder
    Rm {
        path: String,
        #[arg(long)]
        folder: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stow=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Commands::Login = cli.command {
        return login(cli.server, cli.token);
    }

    let config = Config::load()?.with_overrides(cli.server, cli.token);
    let (server, token) = config.require_auth()?;
    let client = RestClient::new(server, token);

    match cli.command {
        Commands::Login => unreachable!(),
        Commands::Cp { source, dest } => {
            let resp = client.copy_file(&source, &dest).await?;
            print_outcome(&resp.message, resp.dest_path.as_deref(), &resp.errors);
        }
        Commands::Mv { source, dest } => {
            let resp = client.move_file(&source, &dest).await?;
            print_outcome(&resp.message, resp.dest_path.as_deref(), &resp.errors);
        }
        Commands::Rename { source, new_name } => {
            let resp = client.rename_file(&source, &new_name).await?;
            print_outcome(&resp.message, resp.new_path.as_deref(), &resp.errors);
        }
        Commands::Mvdir { source, dest_parent } => {
            let resp = client.move_folder(&source, &dest_parent).await?;
            print_outcome(&resp.message, resp.dest_path.as_deref(), &resp.errors);
            if let Some(count) = resp.moved_count {
                println!("moved {} objects", count);
            }
        }
        Commands::Renamedir { source, new_name } => {
            let resp = client.rename_folder(&source, &new_name).await?;
            print_outcome(&resp.message, resp.dest_path.as_deref(), &resp.errors);
            if let Some(count) = resp.moved_count {
                println!("moved {} objects", count);
            }
        }
        Commands::Mkdir { path } => {
            let resp = client.create_folder(&path).await?;
            print_outcome(&resp.message, resp.path.as_deref(), &resp.errors);
        }
        Commands::Rm { path, folder } => {
            let resp = client.delete(&path, folder).await?;
            let message = if resp.success { "deleted" } else { "delete failed" };
            print_outcome(message, Some(&resp.path), &resp.errors);
            if let Some(count) = resp.deleted_count {
                println!("deleted {} objects", count);
            }
        }
    }

    Ok(())
}

fn login(server: Option<String>, token: Option<String>) -> anyhow::Result<()> {
    let server = server.ok_or_else(|| anyhow::anyhow!("--server is required"))?;
    let token = token.ok_or_else(|| anyhow::anyhow!("--token is required (issue one with: stowd token --user <id>)"))?;

    let mut config = Config::load()?;
    config.server_url = Some(server.trim_end_matches('/').to_string());
    config.token = Some(token);
    config.save()?;

    println!("saved to {}", Config::config_path()?.display());
    Ok(())
}

fn print_outcome(message: &str, path: Option<&str>, errors: &[ItemError]) {
    match path {
        Some(path) => println!("{}: {}", message, path),
        None => println!("{}", message),
    }
    if !errors.is_empty() {
        println!("{} objects failed:", errors.len());
        for e in errors {
            println!("  {}  {}", e.item, e.error);
        }
    }
}

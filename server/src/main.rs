//! Stowage storage admin server (stowd)

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod storage;

use config::{Config, StorageBackend};

#[derive(Parser)]
#[command(name = "stowd")]
#[command(about = "Stowage path-safe object storage admin server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (runs in background)
    Serve {
        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the server
    Down,
    /// Show server status
    Status,
    /// Issue an access token for a caller
    Token {
        /// Caller id; the token grants access to users/<id>/
        #[arg(long)]
        user: String,
        /// Lifetime in hours
        #[arg(long, default_value_t = auth::ACCESS_TOKEN_HOURS)]
        hours: i64,
    },
    /// Upload the files of a local folder into a caller's namespace
    Import {
        /// Folder to import
        path: String,
        /// Caller id owning the imported objects
        #[arg(long)]
        user: String,
    },
}

fn pid_file() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stowd.pid")
}

fn is_server_running() -> Option<u32> {
    let pid_path = pid_file();
    if pid_path.exists() {
        if let Ok(pid_str) = fs::read_to_string(&pid_path) {
            if let Ok(pid) = pid_str.trim().parse::<u32>() {
                // Check if process is still running
                #[cfg(unix)]
                {
                    let result = Command::new("kill")
                        .args(["-0", &pid.to_string()])
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status();
                    if result.map(|s| s.success()).unwrap_or(false) {
                        return Some(pid);
                    }
                }
                #[cfg(not(unix))]
                {
                    return Some(pid);
                }
            }
        }
        // Stale pid file, remove it
        let _ = fs::remove_file(&pid_path);
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't need full init
    match &cli.command {
        Commands::Down => {
            return stop_server();
        }
        Commands::Status => {
            return show_status();
        }
        Commands::Serve { foreground } if !foreground => {
            return start_daemon();
        }
        _ => {}
    }

    // Initialize logging for foreground commands
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stowd=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve { foreground: _ } => {
            // Running in foreground mode
            run_server(config).await?;
        }
        Commands::Down => unreachable!(),
        Commands::Status => unreachable!(),
        Commands::Token { user, hours } => {
            issue_token(&config, &user, hours)?;
        }
        Commands::Import { path, user } => {
            import_folder(&config, &path, &user).await?;
        }
    }

    Ok(())
}

fn start_daemon() -> anyhow::Result<()> {
    // Check if already running
    if let Some(pid) = is_server_running() {
        println!("stowd already running (pid {})", pid);
        return Ok(());
    }

    // Fail here rather than in the detached child
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Get current executable path
    let exe = std::env::current_exe()?;

    // Spawn detached process with --foreground flag
    let child = Command::new(&exe)
        .args(["serve", "--foreground"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let pid = child.id();

    // Save PID
    let pid_path = pid_file();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, pid.to_string())?;

    println!("stowd serving on localhost:{}", config.rest_port);
    println!("pid: {}", pid);

    Ok(())
}

fn stop_server() -> anyhow::Result<()> {
    if let Some(pid) = is_server_running() {
        #[cfg(unix)]
        {
            Command::new("kill").args([&pid.to_string()]).status()?;
        }
        #[cfg(not(unix))]
        {
            Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F"])
                .status()?;
        }

        let _ = fs::remove_file(pid_file());
        println!("stowd stopped");
    } else {
        println!("stowd not running");
    }
    Ok(())
}

fn show_status() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    if let Some(pid) = is_server_running() {
        println!("{} running", config.server_name);
        println!("  pid: {}", pid);
        println!("  rest: localhost:{}", config.rest_port);
        println!("  storage: {:?} ({})", config.storage_backend, config.storage_path);
    } else {
        println!("stowd not running");
    }
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    // Save PID for foreground mode too
    let pid_path = pid_file();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, std::process::id().to_string())?;

    // The store handle is built once and injected everywhere it is needed
    let store = storage::open_store(&config).await?;
    let app_state = api::AppState::new(store, config.clone());

    tracing::info!(
        "{} batches: delete {} every {:?}, move {} every {:?}",
        config.server_name,
        config.batch.delete_batch_size,
        config.batch.delete_batch_delay,
        config.batch.move_batch_size,
        config.batch.move_batch_delay
    );

    let rest_addr = format!("0.0.0.0:{}", config.rest_port).parse()?;
    tracing::info!("REST listening on {}", rest_addr);
    api::rest::serve(rest_addr, app_state).await?;

    // Cleanup PID file
    let _ = fs::remove_file(pid_file());

    Ok(())
}

fn issue_token(config: &Config, user: &str, hours: i64) -> anyhow::Result<()> {
    let token = auth::create_access_token(&config.jwt_secret, user, hours)?;
    println!("{}", token);
    Ok(())
}

async fn import_folder(config: &Config, path: &str, user: &str) -> anyhow::Result<()> {
    if config.storage_backend == StorageBackend::Memory {
        anyhow::bail!("import needs a persistent store (STORAGE_BACKEND=local)");
    }
    // The running server keeps its own index of the store
    if let Some(pid) = is_server_running() {
        anyhow::bail!("stowd is running (pid {}); stop it first with: stowd down", pid);
    }

    let base_path = std::path::Path::new(path);
    if !base_path.is_dir() {
        anyhow::bail!("not a folder: {}", path);
    }

    let store = storage::open_store(config).await?;
    let namespace = storage::path::namespace_of(user);

    println!("importing {} into {}...", path, namespace);

    let mut count = 0;
    let mut skipped = 0;
    for entry in walkdir::WalkDir::new(base_path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let file_path = entry.path();
        let Ok(rel) = file_path.strip_prefix(base_path) else {
            continue;
        };

        // Skip hidden files
        if rel
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            continue;
        }

        let key = format!("{}{}", namespace, rel.to_string_lossy().replace('\\', "/"));
        if let Err(e) = storage::path::validate(&key, user, "import") {
            println!("  - {} ({})", key, e);
            skipped += 1;
            continue;
        }

        let content = tokio::fs::read(file_path).await?;
        let content_type = mime_guess::from_path(file_path)
            .first_or_octet_stream()
            .to_string();
        store.put(&key, content.into(), &content_type).await?;

        println!("  {}", key);
        count += 1;
    }

    println!("imported {} files", count);
    if skipped > 0 {
        println!("skipped {} files with unsupported paths", skipped);
    }
    Ok(())
}

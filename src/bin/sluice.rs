//! Sluice CLI: manage and run ingestion adapters.
//!
//! Usage:
//!   sluice protocols
//!   sluice adapter <add|list|show|remove> [--db path]
//!   sluice guess <id> | preview <id> [-n N]
//!   sluice run [ids...]

use clap::{Parser, Subcommand};
use sluice::{
    AdapterDescription, AdapterManager, AdapterStore, OpenStore, Settings, SqliteStore,
    WriterTransport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sluice",
    version,
    about = "Pull and stream adapters feeding a uniform event pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available protocols and their parameters
    Protocols,
    /// Manage stored adapter descriptions
    Adapter {
        #[command(subcommand)]
        action: AdapterAction,
    },
    /// Sample an adapter's source and print the guessed schema
    Guess {
        /// Adapter id
        id: String,
    },
    /// Print events from an adapter's source with its rules applied
    Preview {
        /// Adapter id
        id: String,
        /// Number of records to sample
        #[arg(short, default_value_t = 10)]
        n: usize,
    },
    /// Run adapters, writing events to stdout as JSON lines until Ctrl-C
    Run {
        /// Adapter ids; all stored adapters when empty
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AdapterAction {
    /// Import a description from a YAML file
    Add {
        /// Path to the description file
        #[arg(required = true)]
        path: PathBuf,
    },
    /// List stored adapters
    List,
    /// Print one description as YAML
    Show {
        /// Adapter id
        id: String,
    },
    /// Delete a stored adapter
    Remove {
        /// Adapter id
        id: String,
    },
}

fn load_settings(path: Option<&Path>) -> Result<Settings, String> {
    match path {
        Some(path) => Settings::load(path).map_err(|e| e.to_string()),
        None => Ok(Settings::default()),
    }
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(db: Option<PathBuf>, settings: &Settings) -> Result<SqliteStore, String> {
    let db_path = db.unwrap_or_else(|| settings.database_path());
    SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

fn print_json(value: &impl serde::Serialize) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_protocols(manager: &AdapterManager) -> i32 {
    for protocol in manager.declared_protocols() {
        let kinds: Vec<String> = protocol.kinds.iter().map(|k| k.to_string()).collect();
        println!("{} ({}) - {}", protocol.id, kinds.join("/"), protocol.description);
        for param in &protocol.parameters {
            let required = if param.required { "required" } else { "optional" };
            println!("    {:<16} {:<9} {}", param.name, required, param.description);
        }
    }
    0
}

async fn cmd_adapter_add(manager: &AdapterManager, store: &dyn AdapterStore, path: &Path) -> i32 {
    let yaml = match std::fs::read_to_string(path) {
        Ok(yaml) => yaml,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", path.display(), e);
            return 1;
        }
    };
    let description: AdapterDescription = match serde_yaml::from_str(&yaml) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: invalid adapter description: {}", e);
            return 1;
        }
    };
    match manager.add_adapter(description, store).await {
        Ok(id) => {
            println!("Added adapter '{}'", id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_adapter_list(manager: &AdapterManager, store: &dyn AdapterStore) -> i32 {
    let adapters = match manager.get_all_adapters(store) {
        Ok(adapters) => adapters,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if adapters.is_empty() {
        println!("No adapters defined.");
        return 0;
    }
    println!("{:<36}  {:<24}  {:<6}  {:<12}  {}", "ID", "NAME", "KIND", "PROTOCOL", "TOPIC");
    println!("{}", "-".repeat(96));
    for d in adapters {
        println!(
            "{:<36}  {:<24}  {:<6}  {:<12}  {}",
            d.id, d.name, d.kind, d.protocol.id, d.sink.topic
        );
    }
    0
}

fn cmd_adapter_show(manager: &AdapterManager, store: &dyn AdapterStore, id: &str) -> i32 {
    let description = match manager.get_adapter(id, store) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match serde_yaml::to_string(&description) {
        Ok(yaml) => {
            print!("{}", yaml);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_adapter_remove(manager: &AdapterManager, store: &dyn AdapterStore, id: &str) -> i32 {
    match manager.delete_adapter(id, store).await {
        Ok(()) => {
            println!("Deleted adapter '{}'", id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_guess(manager: &AdapterManager, store: &dyn AdapterStore, id: &str) -> i32 {
    let description = match manager.get_adapter(id, store) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match manager.guess_schema(&description).await {
        Ok(guess) => print_json(&guess),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_preview(manager: &AdapterManager, store: &dyn AdapterStore, id: &str, n: usize) -> i32 {
    let description = match manager.get_adapter(id, store) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match manager.preview(&description, n).await {
        Ok(events) => print_json(&events),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_run(manager: &AdapterManager, store: &dyn AdapterStore, ids: Vec<String>) -> i32 {
    let ids = if ids.is_empty() {
        match manager.get_all_adapters(store) {
            Ok(all) => all.into_iter().map(|d| d.id.to_string()).collect(),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    } else {
        ids
    };
    if ids.is_empty() {
        eprintln!("No adapters to run.");
        return 1;
    }

    let mut failures = 0;
    for id in &ids {
        if let Err(e) = manager.start_adapter(id, store).await {
            error!(adapter_id = %id, error = %e, "failed to start adapter");
            failures += 1;
        }
    }
    if failures == ids.len() {
        return 1;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for Ctrl-C");
    }
    let stopped = manager.stop_all().await;
    info!(stopped, "shutdown complete");
    0
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&settings);

    let manager = match AdapterManager::from_settings(&settings, Arc::new(WriterTransport::stdout())) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Commands::Protocols = cli.command {
        std::process::exit(cmd_protocols(&manager));
    }

    let store = match open_store(cli.db, &settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Protocols => cmd_protocols(&manager),
        Commands::Adapter { action } => match action {
            AdapterAction::Add { path } => cmd_adapter_add(&manager, &store, &path).await,
            AdapterAction::List => cmd_adapter_list(&manager, &store),
            AdapterAction::Show { id } => cmd_adapter_show(&manager, &store, &id),
            AdapterAction::Remove { id } => cmd_adapter_remove(&manager, &store, &id).await,
        },
        Commands::Guess { id } => cmd_guess(&manager, &store, &id).await,
        Commands::Preview { id, n } => cmd_preview(&manager, &store, &id, n).await,
        Commands::Run { ids } => cmd_run(&manager, &store, ids).await,
    };
    std::process::exit(code);
}

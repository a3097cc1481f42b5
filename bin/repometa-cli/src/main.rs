//! RepoMeta CLI - Repository class metadata browser
//!
//! This binary wires the query client, metadata cache, loader and audit
//! logger together and exposes root-class discovery and class hydration as
//! subcommands.

use anyhow::Result;
use clap::{Parser, Subcommand};
use repometa_audit::AuditLogger;
use repometa_cache::{MetadataCache, MetadataLoader};
use repometa_client::GraphqlClient;
use repometa_common::{Config, RootClass, ToolError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "repometa")]
#[command(about = "Browse content repository class metadata")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "REPOMETA_CONFIG")]
    config: Option<PathBuf>,

    /// GraphQL endpoint URL
    #[arg(long, env = "SERVER_URL")]
    server_url: Option<String>,

    /// Object store identifier
    #[arg(long, env = "OBJECT_STORE")]
    object_store: Option<String>,

    /// User name for basic authentication
    #[arg(long, env = "USERNAME")]
    username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Verify TLS certificates
    #[arg(long, env = "SSL_ENABLED")]
    ssl_enabled: Option<bool>,

    /// Audit log file
    #[arg(long)]
    audit_file: Option<PathBuf>,

    /// Write each audit entry as it is recorded
    #[arg(long)]
    write_on_add: bool,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List root class buckets with their class counts
    Roots,
    /// Discover and list the classes of a root class
    Classes {
        /// Root class name (e.g. Document, Folder)
        root: String,
    },
    /// Show a class with its full property list
    Describe {
        /// Class symbolic name
        class: String,
        /// Discover this root class first so the result is cached under it
        #[arg(long)]
        root: Option<String>,
    },
    /// Discover root classes and print the cache layout
    Structure {
        /// Root classes to discover (default: all well-known roots)
        #[arg(long = "root")]
        roots: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;

    let audit = Arc::new(AuditLogger::from_config(&config.audit));
    let client = GraphqlClient::new(config.client.clone())?.with_audit(Arc::clone(&audit));
    let cache = Arc::new(MetadataCache::new());
    let loader = MetadataLoader::new(Arc::new(client), cache, config.metadata.clone());
    info!(
        "Connected to {} (object store {})",
        config.client.server_url, config.client.object_store
    );

    let outcome = run(&loader, args.command).await;

    if let Err(e) = audit.write() {
        error!("Failed to flush audit log: {}", e);
    }

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Layer command line flags over file and environment configuration
fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;

    if let Some(server_url) = &args.server_url {
        config.client.server_url.clone_from(server_url);
    }
    if let Some(object_store) = &args.object_store {
        config.client.object_store.clone_from(object_store);
    }
    if args.username.is_some() {
        config.client.username.clone_from(&args.username);
    }
    if args.password.is_some() {
        config.client.password.clone_from(&args.password);
    }
    if let Some(ssl_enabled) = args.ssl_enabled {
        config.client.ssl_enabled = ssl_enabled;
    }
    if args.audit_file.is_some() {
        config.audit.file_path.clone_from(&args.audit_file);
    }
    if args.write_on_add {
        config.audit.write_on_add = true;
    }

    config.validate()?;
    Ok(config)
}

async fn run(loader: &MetadataLoader, command: Commands) -> Result<(), ToolError> {
    let cache = loader.cache();

    match command {
        Commands::Roots => {
            for root in cache.get_root_class_keys() {
                println!("{root}\t{}", cache.get_all_keys_for_root(&root).len());
            }
        }
        Commands::Classes { root } => {
            loader.load_root_class(&root).await?;
            for class in cache.get_all_keys_for_root(&root) {
                println!("{class}");
            }
        }
        Commands::Describe { class, root } => {
            if let Some(root) = root {
                loader.load_root_class(&root).await?;
            }
            let descriptor = loader.load_class_properties(&class).await?;
            print_json(&descriptor)?;
        }
        Commands::Structure { roots } => {
            let roots = if roots.is_empty() {
                RootClass::ALL.iter().map(|r| r.as_str().to_string()).collect()
            } else {
                roots
            };
            for root in &roots {
                loader.load_root_class(root).await?;
            }
            print_json(&cache.structure())?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ToolError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ToolError::unexpected(format!("Failed to render output: {e}")))?;
    println!("{json}");
    Ok(())
}

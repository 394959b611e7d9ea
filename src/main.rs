//! Lanzo - A container service orchestration control plane
//!
//! This is the main CLI entry point for Lanzo.

use clap::{Parser, Subcommand};
use lanzo::api::{self, AppState};
use lanzo::config::{Settings, DEFAULT_LISTEN, DEFAULT_PROVISION_ROOT};
use lanzo::container::{collect_reports, LifecycleController, PostStartReport};
use lanzo::engine::{DockerResolver, EngineResolver};
use lanzo::engine::resolver::{DEFAULT_ENGINE_PORT, DEFAULT_ENGINE_TIMEOUT_SECS};
use lanzo::service::ServiceDescriptor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Lanzo - container service orchestration
#[derive(Parser)]
#[command(name = "lanzo")]
#[command(version)]
#[command(about = "Deploy pre-declared container services on local or remote engines", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Service registry file replacing the built-in table
    #[arg(long, global = true, env = "LANZO_REGISTRY")]
    registry: Option<PathBuf>,

    /// Port of remote engines
    #[arg(long, global = true, env = "LANZO_ENGINE_PORT", default_value_t = DEFAULT_ENGINE_PORT)]
    engine_port: u16,

    /// Engine request timeout in seconds
    #[arg(long, global = true, env = "LANZO_ENGINE_TIMEOUT", default_value_t = DEFAULT_ENGINE_TIMEOUT_SECS)]
    engine_timeout: u64,

    /// Wait before post-start commands, in milliseconds
    #[arg(long, global = true, env = "LANZO_SETTLE_DELAY_MS", default_value_t = 3000)]
    settle_delay_ms: u64,

    /// Root of the provisioning directories
    #[arg(long, global = true, env = "LANZO_PROVISION_ROOT", default_value = DEFAULT_PROVISION_ROOT)]
    provision_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Listen address
        #[arg(long, env = "LANZO_LISTEN", default_value = DEFAULT_LISTEN)]
        listen: SocketAddr,
    },

    /// Run a service
    Run {
        /// Service name
        service: String,
        /// Target engine host
        #[arg(long)]
        host: Option<String>,
    },

    /// Stop and remove a service's containers
    Stop {
        /// Service name
        service: String,
        /// Target engine host
        #[arg(long)]
        host: Option<String>,
    },

    /// Show a service's port mapping
    Port {
        /// Service name
        service: String,
        /// Target engine host
        #[arg(long)]
        host: Option<String>,
    },

    /// List registered services
    Services,

    /// Provision infrastructure
    Provision {
        #[command(subcommand)]
        command: ProvisionCommands,
    },
}

#[derive(Subcommand)]
enum ProvisionCommands {
    /// Run init and apply
    Deploy {
        /// Provisioning directory name
        name: String,
    },
    /// Run destroy
    Destroy {
        /// Provisioning directory name
        name: String,
    },
}

impl Cli {
    fn settings(&self, listen: Option<SocketAddr>) -> lanzo::Result<Settings> {
        let mut settings = Settings {
            registry_path: self.registry.clone(),
            engine_port: self.engine_port,
            engine_timeout_secs: self.engine_timeout,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            provision_root: self.provision_root.clone(),
            ..Settings::default()
        };
        if let Some(listen) = listen {
            settings.listen = listen;
        }
        settings.with_port_override(std::env::var("PORT").ok().as_deref())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let listen = match &cli.command {
        Commands::Serve { listen } => Some(*listen),
        _ => None,
    };
    let settings = cli.settings(listen)?;
    let registry = Arc::new(settings.load_registry()?);
    tracing::debug!(services = registry.len(), "Loaded service registry");
    let resolver = settings.resolver();

    match cli.command {
        Commands::Serve { .. } => {
            let state = AppState::new(registry, Arc::new(resolver), settings.provisioner())
                .with_post_start(settings.post_start_options());
            api::serve(state, settings.listen).await?;
        }

        Commands::Run { service, host } => {
            let (tx, rx) = mpsc::unbounded_channel::<PostStartReport>();
            let controller = controller(&resolver, registry, host.as_deref())?
                .with_post_start(settings.post_start_options().with_reports(tx));

            let outcome = controller.run_service(&service).await;
            drop(controller);

            if let Ok(deployment) = &outcome {
                for container in deployment.containers() {
                    println!("{}\t{}", container.name, container.id);
                }
            }

            // Commands scheduled before a failure still run to completion
            for report in collect_reports(rx).await {
                match report.outcome {
                    Ok(_) => println!("{}: post-start command finished", report.service),
                    Err(e) => eprintln!("{}: post-start command failed: {}", report.service, e),
                }
            }
            outcome?;
        }

        Commands::Stop { service, host } => {
            let removed = controller(&resolver, registry, host.as_deref())?
                .stop_service(&service)
                .await?;
            if removed.is_empty() {
                println!("Service {} was not running", service);
            }
            for name in removed {
                println!("{}", name);
            }
        }

        Commands::Port { service, host } => {
            let ports = controller(&resolver, registry, host.as_deref())?
                .port_mapping(&service)
                .await?;
            println!("{}", serde_json::to_string_pretty(&ports)?);
        }

        Commands::Services => {
            println!("{:<20} KIND", "SERVICE");
            for descriptor in registry.iter() {
                let kind = match descriptor {
                    ServiceDescriptor::Concrete(_) => "concrete",
                    ServiceDescriptor::Composite(_) => "composite",
                };
                println!("{:<20} {}", descriptor.name(), kind);
            }
        }

        Commands::Provision { command } => {
            let engine = resolver.resolve(None)?;
            let provisioner = settings.provisioner();
            match command {
                ProvisionCommands::Deploy { name } => {
                    let output = provisioner.deploy(engine.as_ref(), &name).await?;
                    println!("{}\n{}", output.init, output.apply);
                }
                ProvisionCommands::Destroy { name } => {
                    let output = provisioner.destroy(engine.as_ref(), &name).await?;
                    println!("{}", output);
                }
            }
        }
    }

    Ok(())
}

fn controller(
    resolver: &DockerResolver,
    registry: Arc<lanzo::service::ServiceRegistry>,
    host: Option<&str>,
) -> lanzo::Result<LifecycleController> {
    let engine = resolver.resolve(host)?;
    Ok(LifecycleController::new(registry, engine))
}

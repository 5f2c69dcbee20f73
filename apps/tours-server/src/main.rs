use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tours_service::{logging, Config, CrashSupervisor, ToursServiceModule};

#[derive(Parser)]
#[command(name = "tours-server")]
#[command(about = "Tours, users and reviews REST API", long_about = None)]
struct Cli {
    /// YAML configuration file; TOURS_* environment variables override it
    #[arg(short, long, env = "TOURS_CONFIG")]
    config: Option<PathBuf>,
}

fn main() {
    // Panic hook goes in before anything that can fail
    let supervisor = CrashSupervisor::install();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            supervisor.terminate_immediately(&err.into());
            return;
        }
    };

    runtime.block_on(async {
        if let Err(err) = run(&supervisor).await {
            supervisor.handle_escaped_failure(&err).await;
        }
        supervisor.settle().await;
    });
}

async fn run(supervisor: &Arc<CrashSupervisor>) -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging)?;
    tracing::info!(
        config_file = ?cli.config,
        environment = ?config.environment,
        "configuration loaded"
    );

    let address = config.bind_address()?;
    let module = ToursServiceModule::init(config)?;

    let listener = TcpListener::bind(address).await?;
    module.serve(listener, supervisor).await
}

//! Vigil CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init => commands::init(config, cli.json).await,
        Commands::Admit(args) => commands::admit(args, config, cli.json).await,
        Commands::Decide(args) => commands::decide(args, config, cli.json).await,
        Commands::Cancel(args) => commands::cancel(args, config, cli.json).await,
        Commands::Show(args) => commands::show(args, config, cli.json).await,
        Commands::List(args) => commands::list(args, config, cli.json).await,
        Commands::History(args) => commands::history(args, config, cli.json).await,
        Commands::PolicySync(args) => commands::policy_sync(args, config, cli.json).await,
        Commands::Monitor => commands::monitor(config).await,
    };

    if let Err(err) = result {
        vigil::cli::handle_error(err, cli.json);
    }
}

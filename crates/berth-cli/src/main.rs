use clap::{Parser, Subcommand};

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(
    name = "berth",
    about = "Berth — container service topology descriptor",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a berth.toml scaffold with every default spelled out
    Init {
        /// Output file
        #[arg(short, long, default_value = "berth.toml")]
        path: String,
        /// Application name
        #[arg(short, long, default_value = "webapp")]
        name: String,
        /// Public domain the service is reached at
        #[arg(short, long, default_value = "app.example.com")]
        domain: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate a topology file
    Validate {
        #[arg(short, long, default_value = "berth.toml")]
        path: String,
    },
    /// Render the deployment plan for a topology file
    Render {
        #[arg(short, long, default_value = "berth.toml")]
        path: String,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Replay probe results through the health policy.
    ///
    /// Each result is one of pass, fail, error, or an HTTP status code
    /// that is matched against the policy's success codes.
    Simulate {
        #[arg(short, long, default_value = "berth.toml")]
        path: String,
        /// Comma-separated probe results, e.g. "pass,pass,503,error"
        #[arg(long, value_delimiter = ',', required = true)]
        probes: Vec<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Probe live targets with the topology's health policy until Ctrl-C
    Watch {
        #[arg(short, long, default_value = "berth.toml")]
        path: String,
        /// Target address (host:port); repeat for several targets
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("berth=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Init {
            path,
            name,
            domain,
            force,
        } => commands::init::init(&path, &name, &domain, force),
        Commands::Validate { path } => commands::validate::validate(&path),
        Commands::Render { path, format } => commands::render::render(&path, format),
        Commands::Simulate {
            path,
            probes,
            format,
        } => commands::simulate::simulate(&path, &probes, format),
        Commands::Watch { path, targets } => commands::watch::watch(&path, &targets).await,
    }
}

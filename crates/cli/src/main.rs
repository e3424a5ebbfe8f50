use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "synorelay")]
#[command(about = "Synology Chat to Anthropic webhook relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the relay (POST /webhook). Settings come from the environment, optionally layered over a JSON config file. This is the default when no subcommand is given.
    Serve {
        /// Config file path (default: SYNORELAY_CONFIG_PATH or ~/.synorelay/config.json; missing file is fine)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Listening port (default: PORT env, config, or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Resolve settings and build clients without serving; prints the effective settings (secrets redacted).
    Check {
        /// Config file path (default: SYNORELAY_CONFIG_PATH or ~/.synorelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("synorelay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Check { config }) => {
            if let Err(e) = run_check(config) {
                log::error!("check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            if let Err(e) = run_serve(None, None).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_settings(config_path: Option<std::path::PathBuf>) -> anyhow::Result<lib::config::Settings> {
    let (config, path) = lib::config::load_config(config_path)?;
    log::debug!("config path: {}", path.display());
    lib::config::resolve_settings(&config)
}

fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let _state = lib::relay::build_state(&settings)?;
    println!("{:#?}", settings);
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut settings = load_settings(config_path)?;
    if let Some(p) = port {
        settings.port = p;
    }
    lib::relay::run_relay(settings).await
}

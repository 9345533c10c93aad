//! TideSync - keep a local directory in sync with a TideSync server
//!
//! Every invocation of `tidesync sync` runs one complete round: local changes
//! are pushed, remote changes are pulled, and the directory is rewritten
//! atomically.

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tidesync_config::{Config, ConfigFormat, ConfigLoader, LoggingConfig, SyncConfig};
use tidesync_sync::{SyncClient, SyncSettings, TcpTransport};
use tidesync_types::{Error, FileFilter};
use tracing::info;

mod display;
mod json_output;

use json_output::SyncResultJson;

/// TideSync - keep a local directory in sync with a TideSync server
#[derive(Parser, Debug)]
#[command(
    name = "tidesync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Keep a local directory in sync with a TideSync server",
    long_about = "TideSync synchronizes the files of a local directory with a remote server.\n\
                  Each sync pushes local additions, changes and deletions, pulls those made\n\
                  elsewhere, and resolves conflicts in favour of the server."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - errors only
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one sync round
    Sync(SyncArgs),
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: FormatArg,
    },
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Directory to synchronize
    #[arg(long)]
    contents_dir: Option<PathBuf>,
    /// File recording the last successful sync
    #[arg(long)]
    metadata_file: Option<PathBuf>,
    /// Server address as host:port
    #[arg(long)]
    server: Option<String>,
    /// Also synchronize hidden files
    #[arg(long)]
    include_hidden: bool,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl SyncArgs {
    fn apply(&self, sync: &mut SyncConfig) {
        if let Some(contents_dir) = &self.contents_dir {
            sync.contents_dir = contents_dir.clone();
        }
        if let Some(metadata_file) = &self.metadata_file {
            sync.metadata_file = metadata_file.clone();
        }
        if let Some(server) = &self.server {
            sync.server_addr = server.clone();
        }
        if self.include_hidden {
            sync.file_filter = FileFilter::IncludeAll;
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Yaml,
    Toml,
    Json,
}

impl From<FormatArg> for ConfigFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Yaml => ConfigFormat::Yaml,
            FormatArg::Toml => ConfigFormat::Toml,
            FormatArg::Json => ConfigFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            display::display_error(&format!("{:#}", error));
            ExitCode::from(exit_code(&error))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.command {
        Commands::Config { default: true, .. } => Config::default(),
        _ => load_config(cli.config.as_deref())?,
    };

    init_logging(cli.debug, cli.quiet, cli.verbose, &config.logging)?;
    info!("TideSync v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync(args) => sync_command(config, &args, cli.verbose).await,
        Commands::Config { format, .. } => config_command(&config, format),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let loaded = match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load_default(),
    };
    loaded.map_err(|e| Error::from(e).into())
}

fn init_logging(debug: bool, quiet: bool, verbose: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = if logging.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

async fn sync_command(mut config: Config, args: &SyncArgs, verbose: bool) -> Result<()> {
    args.apply(&mut config.sync);
    config.validate().map_err(Error::from)?;

    let sync = config.sync;
    let settings = SyncSettings::new(sync.contents_dir, sync.metadata_file)
        .with_filter(sync.file_filter);
    let mut client = SyncClient::new(settings, TcpTransport::new(sync.server_addr.as_str()));

    let report = client.run_round().await?;

    if args.json {
        let output = SyncResultJson::new(client.settings(), &sync.server_addr, report);
        println!("{}", output.to_json_string()?);
    } else if verbose {
        display::display_sync_report(client.settings(), &sync.server_addr, &report);
    }

    Ok(())
}

fn config_command(config: &Config, format: FormatArg) -> Result<()> {
    let rendered = ConfigFormat::from(format)
        .render(config)
        .map_err(Error::from)?;
    print!("{}", rendered);
    Ok(())
}

fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<Error>()
        .and_then(|error| u8::try_from(error.exit_code()).ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;
    use tidesync_types::{ItemId, ServerIdentity};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_flags_override_config() {
        let cli = Cli::try_parse_from([
            "tidesync",
            "--verbose",
            "sync",
            "--contents-dir",
            "/data/notes",
            "--server",
            "sync.example.org:9000",
            "--include-hidden",
        ])
        .unwrap();
        assert!(cli.verbose);

        let Commands::Sync(args) = cli.command else {
            panic!("expected the sync command");
        };
        let mut config = Config::default();
        args.apply(&mut config.sync);

        assert_eq!(config.sync.contents_dir, PathBuf::from("/data/notes"));
        assert_eq!(config.sync.server_addr, "sync.example.org:9000");
        assert_eq!(config.sync.file_filter, FileFilter::IncludeAll);
        assert_eq!(
            config.sync.metadata_file,
            SyncConfig::default().metadata_file
        );
    }

    #[test]
    fn test_config_command_arguments() {
        let cli = Cli::try_parse_from(["tidesync", "config", "--default", "--format", "toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                default: true,
                format: FormatArg::Toml
            }
        ));
    }

    #[rstest]
    #[case(Error::config("bad"), 2)]
    #[case(Error::ServerReset { expected: ServerIdentity::from_u128(1), actual: ServerIdentity::from_u128(2) }, 4)]
    #[case(Error::invariant(format!("item {} twice", ItemId::from_u128(1))), 5)]
    #[case(Error::remote("refused"), 6)]
    #[case(Error::io("disk"), 1)]
    fn test_exit_codes(#[case] error: Error, #[case] expected: u8) {
        let error = anyhow::Error::from(error).context("sync failed");
        assert_eq!(exit_code(&error), expected);
    }

    #[test]
    fn test_foreign_errors_exit_with_one() {
        assert_eq!(exit_code(&anyhow!("something else")), 1);
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use ubidots_cli::config::{AppConfig, ConfigManager};
use ubidots_cli::payload::{Reading, build_payload};
use ubidots_client_core::{
    ConnectMode, ConnectionManager, ProtocolClient, StdDelay, TelemetryClient, WireFormat,
};

#[derive(Parser)]
#[command(name = "ubidots")]
#[command(author, version, about = "Ubidots telemetry client - send readings and fetch last values", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Server host, overrides the configuration
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port, overrides the configuration
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Wire format, overrides the configuration
    #[arg(long, global = true, value_enum)]
    format: Option<FormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send readings to a device
    Send {
        /// Device label
        device: String,

        /// Human-readable device name (line protocol only)
        #[arg(short, long)]
        name: Option<String>,

        /// Readings as VARIABLE=VALUE
        #[arg(required = true, value_name = "VARIABLE=VALUE")]
        readings: Vec<Reading>,
    },

    /// Fetch the last value of a variable
    Get {
        /// Device label
        device: String,

        /// Variable label
        variable: String,
    },

    /// Check that the server accepts connections
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., client.timeout_ms)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., client.token)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,

    /// Show the configuration file path
    Path,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Http,
    Line,
}

impl From<FormatArg> for WireFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Http => WireFormat::Http,
            FormatArg::Line => WireFormat::Line,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .filter_module("ubidots_client_core", log::LevelFilter::Debug)
            .filter_module("ubidots_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let overrides = Overrides {
        host: cli.host,
        port: cli.port,
        format: cli.format.map(Into::into),
        debug: cli.debug,
    };

    match cli.command {
        Commands::Send {
            device,
            name,
            readings,
        } => send_command(&overrides.load()?, &device, name.as_deref(), &readings),
        Commands::Get { device, variable } => {
            get_command(&overrides.load()?, &device, &variable)
        }
        Commands::Status => status_command(&overrides.load()?),
        Commands::Config { command } => config_command(command),
    }
}

/// Global flags layered over the loaded configuration
struct Overrides {
    host: Option<String>,
    port: Option<u16>,
    format: Option<WireFormat>,
    debug: bool,
}

impl Overrides {
    fn load(self) -> Result<AppConfig> {
        let mut config = ConfigManager::new()
            .load()
            .context("Failed to load configuration")?;
        config.apply_cli_overrides(self.host, self.port, self.format, self.debug);
        Ok(config)
    }
}

fn client(config: &AppConfig) -> Result<ProtocolClient<ubidots_client_core::TcpTransport>> {
    let format = config.transport.format;
    log::debug!(
        "Using {format} endpoint {}:{}",
        config.client.host,
        config.resolved_port()
    );
    ProtocolClient::new(config.protocol_config(), format, config.transport())
        .context("Invalid client configuration")
}

fn send_command(
    config: &AppConfig,
    device: &str,
    name: Option<&str>,
    readings: &[Reading],
) -> Result<()> {
    let device_name = name.unwrap_or(device);
    let payload = build_payload(
        config.transport.format,
        &config.client.user_agent,
        config.client.token.expose(),
        device,
        device_name,
        readings,
    )?;

    let mut client = client(config)?;
    client
        .try_send_data(device, device_name, &payload)
        .with_context(|| format!("Failed to send data to '{device}'"))?;

    eprintln!(
        "{}",
        format!("✓ Sent {} reading(s) to {device}", readings.len()).green()
    );
    Ok(())
}

fn get_command(config: &AppConfig, device: &str, variable: &str) -> Result<()> {
    let mut client = client(config)?;
    let value = client
        .try_get(device, variable)
        .with_context(|| format!("Failed to get '{device}/{variable}'"))?;

    println!("{value}");
    Ok(())
}

fn status_command(config: &AppConfig) -> Result<()> {
    let protocol_config = config.protocol_config();
    protocol_config
        .validate()
        .context("Invalid client configuration")?;

    let host = protocol_config.host.as_str();
    let port = config.resolved_port();
    let mut connection = ConnectionManager::new(
        config.transport(),
        StdDelay,
        protocol_config.connection_policy(),
    );
    connection.set_debug(protocol_config.debug);

    eprintln!("{}", "Ubidots endpoint:".bold().blue());
    eprintln!("  host:      {host}");
    eprintln!("  port:      {port}");
    eprintln!("  format:    {}", config.transport.format);
    eprintln!("  plaintext: {}", config.transport.plaintext);

    let connected = connection.ensure_connected(host, port, ConnectMode::Secure);
    let attempts = connection.last_connect_attempts();
    connection.close();

    if connected {
        println!("{}", format!("connected after {attempts} attempt(s)").green());
        Ok(())
    } else {
        anyhow::bail!("Could not connect to {host}:{port} after {attempts} attempt(s)")
    }
}

fn config_command(command: ConfigCommand) -> Result<()> {
    let mut manager = ConfigManager::new();

    match command {
        ConfigCommand::Get { key } => {
            let value = manager.get(&key)?;
            println!("{value}");
        }
        ConfigCommand::Set { key, value } => {
            manager.set(&key, &value)?;
            let shown = if key == "client.token" { "***" } else { value.as_str() };
            eprintln!("{}", format!("Set {key} = {shown}").green());
            eprintln!(
                "Configuration saved to: {}",
                manager.get_config_path().display()
            );
        }
        ConfigCommand::List => {
            let items = manager.list()?;
            eprintln!("{}", "Configuration:".bold().blue());
            eprintln!("Config file: {}", manager.get_config_path().display());
            eprintln!();

            let mut section = String::new();
            for (key, value) in items {
                let (head, rest) = key.split_once('.').unwrap_or(("general", key.as_str()));
                if head != section {
                    eprintln!("[{}]", head.yellow());
                    section = head.to_string();
                }
                eprintln!("  {} = {}", rest.cyan(), value);
            }
        }
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
        }
    }

    Ok(())
}

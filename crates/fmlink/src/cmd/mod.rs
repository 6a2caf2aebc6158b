use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use fmlink_client::{
    ClientConfig, Connection, EventHandler, FramingPolicy, DEFAULT_CHANNEL, DEFAULT_HOST,
    DEFAULT_PORT, DEFAULT_VOLUME,
};
use fmlink_transport::Endpoint;
use tracing::info;

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod set;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect, apply the startup volume and channel, and print device events.
    Listen(ListenArgs),
    /// Send a single volume or channel command.
    Set(SetArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format).await,
        Command::Set(args) => set::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Tuner service host.
    #[arg(long, env = "FMLINK_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// Tuner service port.
    #[arg(long, env = "FMLINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Full `host:port` address; overrides --host and --port.
    #[arg(long, value_name = "HOST:PORT", conflicts_with_all = ["host", "port"])]
    pub endpoint: Option<Endpoint>,
    /// Connect and write timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Close the connection on the first framing error instead of resetting.
    #[arg(long)]
    pub fail_fast: bool,
}

impl ConnectArgs {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
            .clone()
            .unwrap_or_else(|| Endpoint::new(self.host.clone(), self.port))
    }

    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let timeout = parse_duration(&self.timeout)?;
        Ok(ClientConfig {
            connect_timeout: Some(timeout),
            write_timeout: Some(timeout),
            framing_policy: if self.fail_fast {
                FramingPolicy::FailFast
            } else {
                FramingPolicy::ResetAndContinue
            },
            ..ClientConfig::default()
        })
    }

    /// Build a connection around `handler` and connect it.
    pub async fn open(&self, handler: impl EventHandler + 'static) -> CliResult<Connection> {
        let endpoint = self.endpoint();
        let connection = Connection::with_config(handler, self.client_config()?);
        connection
            .connect(&endpoint)
            .await
            .map_err(|err| client_error("connect failed", err))?;
        info!(%endpoint, "connected");
        Ok(connection)
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Volume sent right after connecting.
    #[arg(long, env = "FMLINK_VOLUME", default_value_t = DEFAULT_VOLUME)]
    pub volume: u32,
    /// Channel sent right after connecting.
    #[arg(long, env = "FMLINK_CHANNEL", default_value_t = DEFAULT_CHANNEL)]
    pub channel: u32,
    /// Also print radio name and text as publications on this topic.
    #[arg(long)]
    pub topic: Option<String>,
    /// Exit after printing N events.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SetTarget {
    Volume,
    Channel,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// What to change.
    pub target: SetTarget,
    /// New value. Volume keeps the low 8 bits, channel the low 16.
    pub value: u32,
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Wait for the device to report the new value and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the report when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

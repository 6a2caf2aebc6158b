mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::exit::{CliError, INTERNAL};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "fmlink", version, about = "FM tuner service client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
        .and_then(|runtime| runtime.block_on(cmd::run(cli.command, format)));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use fmlink_client::{DEFAULT_CHANNEL, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_VOLUME};

    use super::*;
    use crate::cmd::SetTarget;

    #[test]
    fn listen_defaults_match_the_device() {
        let cli = Cli::try_parse_from(["fmlink", "listen"]).expect("listen args should parse");

        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.connect.host, DEFAULT_HOST);
        assert_eq!(args.connect.port, DEFAULT_PORT);
        assert_eq!(args.volume, DEFAULT_VOLUME);
        assert_eq!(args.channel, DEFAULT_CHANNEL);
        assert!(args.count.is_none());
    }

    #[test]
    fn parses_set_subcommand() {
        let cli = Cli::try_parse_from([
            "fmlink",
            "set",
            "channel",
            "978",
            "--endpoint",
            "127.0.0.1:9502",
            "--wait",
        ])
        .expect("set args should parse");

        let Command::Set(args) = cli.command else {
            panic!("expected set");
        };
        assert_eq!(args.target, SetTarget::Channel);
        assert_eq!(args.value, 978);
        assert!(args.wait);
        assert_eq!(args.connect.endpoint().to_string(), "127.0.0.1:9502");
    }

    #[test]
    fn rejects_endpoint_with_host() {
        let err = Cli::try_parse_from([
            "fmlink",
            "listen",
            "--endpoint",
            "127.0.0.1:9502",
            "--host",
            "10.0.0.1",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_zero_count() {
        let err = Cli::try_parse_from(["fmlink", "listen", "--count", "0"])
            .expect_err("zero count should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}

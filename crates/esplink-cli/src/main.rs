//! `esplink`: talk to an esp-link bridge over its TCP serial port.
//!
//! Every subcommand connects, runs the sync handshake and then performs one
//! exchange. Log verbosity follows `RUST_LOG`, or `-v` / `-vv`.

mod config;
mod error;
mod session;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use esplink_client::{Client, TcpTransport};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "esplink", about = "Talk to an esp-link bridge", version)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bridge address (host:port).
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Length of one receive tick in microseconds.
    #[arg(long, global = true)]
    tick_us: Option<u64>,

    /// Sync attempts before giving up.
    #[arg(long, global = true)]
    sync_retries: Option<u32>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the sync handshake only.
    Sync,
    /// Print the module clock as HH:MM:SS (UTC).
    Time,
    /// Print the WiFi station state.
    WifiStatus,
    /// Publish one MQTT message.
    Publish {
        topic: String,
        message: String,
        #[arg(long, default_value_t = 0)]
        qos: u8,
        #[arg(long)]
        retain: bool,
    },
    /// Subscribe to topics and print MQTT notifications until interrupted.
    Monitor {
        #[arg(required = true)]
        topics: Vec<String>,
        /// Stop after this many receive timeouts.
        #[arg(long)]
        rounds: Option<u32>,
    },
    /// Send any catalog command by name, e.g. `exec rest_setup host 80 0`.
    Exec {
        name: String,
        /// Arguments in parameter order. Numbers may be given as 0x hex.
        args: Vec<String>,
    },
}

impl Cli {
    /// File settings with command-line overrides applied.
    fn resolve_config(&self) -> Result<CliConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => CliConfig::load(path)?,
            None => CliConfig::default(),
        };
        if let Some(addr) = &self.addr {
            config.addr = addr.clone();
        }
        if let Some(tick_us) = self.tick_us {
            config.tick_us = tick_us;
        }
        if let Some(retries) = self.sync_retries {
            config.sync_retries = retries;
        }
        Ok(config)
    }

    fn default_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.resolve_config()?;
    let transport = TcpTransport::connect(config.addr.as_str(), config.tick())
        .map_err(|source| CliError::Connect {
            addr: config.addr.clone(),
            source,
        })?;
    let mut client = Client::with_config(transport, config.client_config());
    session::sync(&mut client, config.sync_retries)?;

    match cli.command {
        Command::Sync => {}
        Command::Time => match session::format_time(session::get_time(&mut client)?) {
            Some(time) => println!("{}", time),
            None => println!("time not set"),
        },
        Command::WifiStatus => {
            let status = session::wifi_status(&mut client)?;
            println!("{} ({})", session::wifi_status_name(status), status);
        }
        Command::Publish {
            topic,
            message,
            qos,
            retain,
        } => {
            session::publish(&mut client, &topic, message.as_bytes(), qos, retain)?;
        }
        Command::Monitor { topics, rounds } => {
            let events = session::mqtt_setup(&mut client, &topics)?;
            session::monitor(&mut client, &events, rounds, |event| println!("{}", event))?;
        }
        Command::Exec { name, args } => {
            if let Some(value) = session::exec(&mut client, &name, &args)? {
                println!("{} (0x{:X})", value, value);
            }
        }
    }

    let stats = client.stats();
    info!(
        "sent {} requests, accepted {} frames ({} checksum errors, {} overflows)",
        stats.requests_sent, stats.frames_accepted, stats.checksum_errors, stats.overflows
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_arguments() {
        let cli = Cli::parse_from(["esplink", "publish", "/spider/LED", "ABCDE", "--retain"]);
        match cli.command {
            Command::Publish {
                topic,
                message,
                qos,
                retain,
            } => {
                assert_eq!(topic, "/spider/LED");
                assert_eq!(message, "ABCDE");
                assert_eq!(qos, 0);
                assert!(retain);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "esplink",
            "--addr",
            "10.0.0.2:23",
            "--sync-retries",
            "1",
            "sync",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.addr, "10.0.0.2:23");
        assert_eq!(config.sync_retries, 1);
        assert_eq!(config.tick_us, CliConfig::default().tick_us);
    }

    #[test]
    fn test_monitor_requires_a_topic() {
        assert!(Cli::try_parse_from(["esplink", "monitor"]).is_err());
    }

    #[test]
    fn test_verbosity_selects_filter() {
        assert_eq!(Cli::parse_from(["esplink", "sync"]).default_filter(), "info");
        assert_eq!(Cli::parse_from(["esplink", "-vv", "time"]).default_filter(), "trace");
    }

    #[test]
    fn test_exec_arguments() {
        let cli = Cli::parse_from(["esplink", "exec", "rest_setup", "example.com", "80", "0"]);
        match cli.command {
            Command::Exec { name, args } => {
                assert_eq!(name, "rest_setup");
                assert_eq!(args, ["example.com", "80", "0"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["esplink", "exec"]).is_err());
    }
}

//! mjpeg-relay binary
//!
//! Usage: mjpeg-relay [OPTIONS] <URL>
//!
//! Environment:
//!   MJPGV2C_LISTEN  listen address (default `:8080`)
//!   MJPGV2C_LOG     also write the log to `mjpgv2c-<timestamp>.txt`
//!   RUST_LOG        log filter

use std::convert::Infallible;
use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use mjpeg_relay::ingest::{IngestConfig, SourceIngest, UpstreamUrl};
use mjpeg_relay::protocol::BoundaryQuirk;
use mjpeg_relay::relay::RelayConfig;
use mjpeg_relay::server::{parse_listen_addr, RelayServer, ServerConfig};
use mjpeg_relay::stats::{StatsConfig, StatsSampler};
use mjpeg_relay::StreamState;

#[derive(Debug, Parser)]
#[command(name = "mjpeg-relay", version, about = "Relay one MJPEG camera stream to many viewers")]
struct Cli {
    /// Upstream stream URL (http://host[:port]/path)
    url: String,

    /// Address to listen on; `:port` binds all interfaces
    #[arg(long, env = "MJPGV2C_LISTEN", default_value = ":8080")]
    listen: String,

    /// Also write the log to a timestamped file
    #[arg(long, env = "MJPGV2C_LOG", value_parser = parse_log_flag)]
    log: bool,

    /// Boundary transform: `strip` or `verbatim`
    #[arg(long, default_value = "strip")]
    boundary_quirk: BoundaryQuirk,

    /// Consecutive failed connections before giving up (0 = never)
    #[arg(long, default_value_t = 10)]
    max_reconnects: u32,

    /// Frames a sequential viewer may lag before jumping to the tail (0 = unbounded)
    #[arg(long, default_value_t = 300)]
    max_lag: u64,
}

/// `1`, `t` or `true` in any common casing enable the flag; anything else
/// leaves it off
fn parse_log_flag(value: &str) -> Result<bool, Infallible> {
    Ok(matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True"))
}

fn init_logging(to_file: bool) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::from_default_env().add_directive("mjpeg_relay=info".parse()?);

    if to_file {
        let name = chrono::Local::now()
            .format("mjpgv2c-%Y_%m_%d-%H_%M_%S.txt")
            .to_string();
        let file = Arc::new(std::fs::File::create(&name)?);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::io::stdout.and(file))
            .init();
        tracing::info!(file = %name, "Logging to file");
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log)?;

    let args: Vec<String> = std::env::args().collect();
    tracing::info!(args = ?args, "Starting mjpeg-relay");

    let url = UpstreamUrl::parse(&cli.url)?;
    let bind_addr = parse_listen_addr(&cli.listen)?;

    let ingest_config = IngestConfig::new(url.clone())
        .boundary_quirk(cli.boundary_quirk)
        .max_reconnect_attempts(cli.max_reconnects);
    let relay = RelayConfig::default().max_sequential_lag(cli.max_lag);

    let (state, writer) = StreamState::new(url.to_string());

    let sampler = StatsSampler::new(state.clone(), StatsConfig::default()).spawn();
    let mut ingest = SourceIngest::new(ingest_config, state.clone(), writer).spawn();

    let server = RelayServer::new(ServerConfig::with_addr(bind_addr), relay, state.clone());
    let mut server_task = tokio::spawn(async move { server.run().await });

    tokio::select! {
        result = &mut server_task => {
            sampler.abort();
            ingest.abort();
            result??;
            return Ok(());
        }
        result = &mut ingest => match result? {
            // Never produced a usable frame: nothing to serve
            Err(e) if state.chain().latest().is_none() => {
                tracing::error!(error = %e, "Upstream failed before the first frame");
                server_task.abort();
                sampler.abort();
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(error = %e, "Ingestion stopped, serving status only");
            }
            Ok(()) => {}
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            return Ok(());
        }
    }

    tokio::select! {
        result = &mut server_task => result??,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
    }
    sampler.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_flag_values() {
        for value in ["1", "t", "T", "true", "TRUE", "True"] {
            assert!(parse_log_flag(value).unwrap(), "{value}");
        }
        for value in ["0", "false", "FALSE", "yes", "", "garbage"] {
            assert!(!parse_log_flag(value).unwrap(), "{value}");
        }
    }

    #[test]
    fn test_cli_log_flag_and_env() {
        let cli = Cli::try_parse_from(["mjpeg-relay", "--log", "http://cam/"]).unwrap();
        assert!(cli.log);

        // Only this test touches the variable
        for (value, expected) in [("1", true), ("TRUE", true), ("t", true), ("nope", false)] {
            std::env::set_var("MJPGV2C_LOG", value);
            let cli = Cli::try_parse_from(["mjpeg-relay", "http://cam/"]).unwrap();
            assert_eq!(cli.log, expected, "MJPGV2C_LOG={value}");
        }
        std::env::remove_var("MJPGV2C_LOG");

        let cli = Cli::try_parse_from(["mjpeg-relay", "http://cam/"]).unwrap();
        assert!(!cli.log);
    }
}

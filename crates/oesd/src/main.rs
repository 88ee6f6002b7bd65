//! oesd - OES forwarding-state manager daemon.
//!
//! Loads the switch configuration, applies the bootstrap state and then
//! runs FDB aging on a timer while logging switch events.

mod config;

use anyhow::Result;
use clap::Parser;
use config::DaemonConfig;
use log::{debug, error, info, warn};
use oes_switch::event::{Event, EventChannel, EventInfo};
use oes_switch::Switch;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// OES forwarding-state manager
#[derive(Parser, Debug)]
#[command(name = "oesd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// FDB aging scan interval in seconds
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    aging_interval: u64,

    /// Print a JSON snapshot of the bootstrapped state and exit
    #[arg(long)]
    dump: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("oesd: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            info!("oesd: loading configuration from {}", path.display());
            DaemonConfig::load(path)?
        }
        None => {
            warn!("oesd: no configuration file given, starting with defaults");
            DaemonConfig::default()
        }
    };

    let mut sw = config.build()?;
    info!(
        "oesd: {} ports, {} bridges",
        sw.config().ports.len(),
        sw.bridge_get().len()
    );

    if args.dump {
        println!("{}", serde_json::to_string_pretty(&sw.snapshot())?);
        return Ok(());
    }

    let channel = config::subscribe_all(&mut sw)?;
    let sw = Arc::new(Mutex::new(sw));
    let logger = tokio::spawn(log_events(channel));

    info!(
        "oesd: running, FDB aging every {}s",
        args.aging_interval
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(args.aging_interval));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let aged = sw.lock().await.fdb_age(Instant::now());
                if aged > 0 {
                    debug!("oesd: aged out {} FDB entries", aged);
                }
            }
            res = tokio::signal::ctrl_c() => {
                match res {
                    Ok(()) => warn!("oesd: received SIGINT, shutting down"),
                    Err(e) => error!("oesd: failed to listen for ctrl-c: {}", e),
                }
                break;
            }
        }
    }

    logger.abort();
    shutdown(&sw).await;
    Ok(())
}

async fn shutdown(sw: &Mutex<Switch>) {
    let sw = sw.lock().await;
    let entries: usize = sw
        .bridge_get()
        .into_iter()
        .filter_map(|br| sw.fdb_uc_count(br).ok())
        .sum();
    info!("oesd: shutdown complete with {} FDB entries", entries);
}

async fn log_events(mut channel: EventChannel) {
    while let Some(info) = channel.recv().await {
        info!("oesd: {}", describe(&info));
    }
    debug!("oesd: event channel closed");
}

fn describe(info: &EventInfo) -> String {
    let detail = match &info.event {
        Event::PortOperState { port, state } => format!("port {} oper {}", port, state),
        Event::FdbLearned {
            vid,
            mac,
            port,
            installed,
        } => format!(
            "learned {} vlan {} on port {}{}",
            mac,
            vid,
            port,
            if *installed { "" } else { " (pending)" }
        ),
        Event::FdbAged { vid, mac, port } => {
            format!("aged {} vlan {} on port {}", mac, vid, port)
        }
    };
    format!(
        "{} {} {}: {}",
        info.timestamp.format("%H:%M:%S%.3f"),
        info.bridge,
        info.event.kind(),
        detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use oes_types::{BridgeId, LogPort, MacAddress, OperState, VlanId};

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["oesd"]);
        assert_eq!(args.config, None);
        assert_eq!(args.log_level, "info");
        assert_eq!(args.aging_interval, 1);
        assert!(!args.dump);
    }

    #[test]
    fn test_args_reject_zero_interval() {
        assert!(Args::try_parse_from(["oesd", "--aging-interval", "0"]).is_err());
        let args = Args::parse_from(["oesd", "-c", "/etc/oesd.yaml", "--dump"]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/oesd.yaml")));
        assert!(args.dump);
    }

    #[test]
    fn test_describe_events() {
        let oper = EventInfo::new(
            BridgeId(1),
            Event::PortOperState {
                port: LogPort(3),
                state: OperState::Up,
            },
        );
        assert!(describe(&oper).ends_with("br1 PORT_OPER_STATE: port 3 oper up"));

        let learned = EventInfo::new(
            BridgeId(0),
            Event::FdbLearned {
                vid: VlanId::new(10).unwrap(),
                mac: MacAddress::new([0x00, 0x1b, 0x21, 0, 0, 1]),
                port: LogPort(2),
                installed: false,
            },
        );
        assert!(describe(&learned).ends_with("(pending)"));
    }
}

// rigkitd -- multi-client rig control daemon.
//
// Serves the rigctld-compatible line protocol on TCP, sharing one
// device handle between all connected clients, with optional multicast
// telemetry.
//
// Usage:
//   rigkitd --model 1                               # simulator, port 4532
//   rigkitd --model 2 --rig-file localhost:4540     # chain to another daemon
//   rigkitd --model 1 -T 127.0.0.1 -T '::1' -t 4532 # dual-stack
//   rigkitd --model 1 --password secret --close-on-idle
//   rigkitd --model 1 --multicast-addr 224.0.2.255 --multicast-port 4533

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rigkit::transport::SerialTransport;
use rigkit::{default_registry, DcdType, Phase, PortConfig, PttType};
use rigkitd::publisher::{self, PublisherConfig};
use rigkitd::server::{Server, SharedRig};
use rigkitd::settings::Settings;

/// rigkitd -- rig control daemon speaking the rigctld line protocol.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Rig model number (1 = simulator, 2 = network rig).
    #[arg(short = 'm', long, default_value_t = 1)]
    model: u32,

    /// Device path (serial port) or host:port (network models).
    #[arg(short = 'r', long = "rig-file")]
    rig_file: Option<String>,

    /// Serial speed override for the rig port.
    #[arg(short = 's', long = "serial-speed")]
    serial_speed: Option<u32>,

    /// Separate PTT device path (serial control line keying).
    #[arg(short = 'p', long = "ptt-file")]
    ptt_file: Option<String>,

    /// PTT type: RIG, DTR, RTS or NONE.
    #[arg(short = 'P', long = "ptt-type", default_value = "RIG")]
    ptt_type: String,

    /// Separate DCD device path (serial control line sensing).
    #[arg(long = "dcd-file")]
    dcd_file: Option<String>,

    /// DCD type: RIG, CD, CTS or NONE.
    #[arg(long = "dcd-type", default_value = "RIG")]
    dcd_type: String,

    /// Listen address; repeat for dual-stack (e.g. -T 0.0.0.0 -T '::').
    #[arg(short = 'T', long = "listen-addr")]
    listen_addr: Vec<String>,

    /// Listen port.
    #[arg(short = 't', long = "port", default_value_t = 4532)]
    port: u16,

    /// Enable per-command VFO qualifiers for all connections.
    #[arg(short = 'o', long = "vfo-mode")]
    vfo_mode: bool,

    /// Close the device when the last client disconnects.
    #[arg(long = "close-on-idle")]
    close_on_idle: bool,

    /// Shared secret clients must present via \password.
    #[arg(short = 'A', long)]
    password: Option<String>,

    /// Reopen attempts after a hard device error.
    #[arg(long = "reopen-retries", default_value_t = 3)]
    reopen_retries: u32,

    /// Backoff between reopen attempts, in milliseconds.
    #[arg(long = "reopen-backoff-ms", default_value_t = 500)]
    reopen_backoff_ms: u64,

    /// Response line separator character.
    #[arg(short = 'S', long = "separator", default_value_t = '\n')]
    separator: char,

    /// Multicast group for telemetry (disabled when absent).
    #[arg(short = 'M', long = "multicast-addr")]
    multicast_addr: Option<String>,

    /// Multicast port for telemetry.
    #[arg(long = "multicast-port", default_value_t = 4533)]
    multicast_port: u16,

    /// Telemetry snapshot interval, in milliseconds.
    #[arg(long = "multicast-interval-ms", default_value_t = 1000)]
    multicast_interval_ms: u64,

    /// Backend configuration overrides, key=value (repeatable).
    /// Recognized by the core: cache_timeout, twiddle_timeout.
    #[arg(short = 'C', long = "set-conf", value_name = "KEY=VALUE")]
    conf: Vec<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_conf(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("bad -C override (want key=value): {pair:?}"))?;
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let conf = parse_conf(&args.conf)?;
    let ptt_type: PttType = args
        .ptt_type
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let dcd_type = match args.dcd_type.to_uppercase().as_str() {
        "RIG" => DcdType::Rig,
        "CD" => DcdType::CdSerial,
        "CTS" => DcdType::CtsSerial,
        "NONE" => DcdType::None,
        other => bail!("unknown DCD type: {other:?}"),
    };

    let registry = default_registry();
    let caps = registry
        .caps(args.model)
        .with_context(|| format!("unknown model {}", args.model))?;
    info!(model = args.model, name = caps.model_name, "selected model");

    let port = PortConfig {
        pathname: args.rig_file.clone().unwrap_or_default(),
        baud_rate: args.serial_speed.unwrap_or(caps.default_baud_rate),
        timeout_ms: caps.timeout_ms,
        retries: caps.retries,
        write_delay_ms: caps.write_delay_ms,
        post_write_delay_ms: caps.post_write_delay_ms,
        ptt_type,
        ptt_pathname: args.ptt_file.clone(),
        dcd_type,
        dcd_pathname: args.dcd_file.clone(),
        params: conf.clone(),
    };

    let mut rig = registry
        .build(args.model, &port)
        .context("building backend")?;

    if let Some(ms) = conf.get("cache_timeout") {
        rig.set_cache_timeout_all(ms.parse().context("cache_timeout must be ms")?);
    }
    if let Some(ms) = conf.get("twiddle_timeout") {
        rig.set_twiddle_window(ms.parse().context("twiddle_timeout must be ms")?);
    }

    rig.init().await.context("backend init failed")?;
    rig.open().await.context("device open failed")?;

    // Auxiliary control-line ports.
    if let Some(path) = &args.ptt_file {
        if matches!(ptt_type, PttType::DtrSerial | PttType::RtsSerial) {
            let transport = SerialTransport::open(path, port.baud_rate.max(9600))
                .await
                .with_context(|| format!("opening PTT port {path}"))?;
            rig.set_ptt_port(Box::new(transport), ptt_type);
        }
    }
    if let Some(path) = &args.dcd_file {
        if matches!(dcd_type, DcdType::CdSerial | DcdType::CtsSerial) {
            let transport = SerialTransport::open(path, port.baud_rate.max(9600))
                .await
                .with_context(|| format!("opening DCD port {path}"))?;
            rig.set_dcd_port(Box::new(transport), dcd_type);
        }
    }

    // Subscribe before the rig moves behind the lock.
    let events = rig.subscribe();

    let settings = Settings {
        vfo_mode: args.vfo_mode,
        password: args.password.clone(),
        close_on_idle: args.close_on_idle,
        reopen_retries: args.reopen_retries,
        reopen_backoff: Duration::from_millis(args.reopen_backoff_ms),
        ptt_type,
        line_sep: args.separator,
        ..Settings::default()
    };
    let shared = SharedRig::new(rig, settings);

    let listen = if args.listen_addr.is_empty() {
        vec!["127.0.0.1".to_string()]
    } else {
        args.listen_addr.clone()
    };
    let addrs: Vec<String> = listen
        .iter()
        .map(|a| {
            if a.contains(':') && !a.starts_with('[') {
                // Bare IPv6 address.
                format!("[{a}]:{}", args.port)
            } else {
                format!("{a}:{}", args.port)
            }
        })
        .collect();

    let server = Server::bind(&addrs, shared.clone())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let cancel = CancellationToken::new();

    if let Some(group) = &args.multicast_addr {
        let target = format!("{group}:{}", args.multicast_port)
            .parse()
            .with_context(|| format!("bad multicast address {group}"))?;
        let config = PublisherConfig {
            target,
            interval: Duration::from_millis(args.multicast_interval_ms),
            ttl: 1,
        };
        info!(%target, "telemetry publisher enabled");
        tokio::spawn(publisher::run(
            shared.clone(),
            events,
            config,
            cancel.clone(),
        ));
    }

    let server_task = tokio::spawn(server.run(cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");
    cancel.cancel();
    let _ = server_task.await;

    // Graceful device shutdown.
    let mut rig = shared.lock_rig().await;
    if rig.phase() == Phase::Opened {
        let _ = rig.close().await;
    }
    let _ = rig.cleanup().await;

    Ok(())
}

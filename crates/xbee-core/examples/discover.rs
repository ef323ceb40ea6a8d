//! Mesh survey tool
//!
//! Discovers the nodes reachable from a locally attached radio, reads one IO
//! pin on each, then prints incoming data packets for a while.
//!
//! Usage:
//!   cargo run --example discover -- [OPTIONS] [PORT]
//!
//! Options:
//!   --port PORT       Serial port (default: first likely radio adapter)
//!   --baud RATE       Baud rate (default: 9600)
//!   --tcp HOST:PORT   Reach the radio through a serial-to-TCP bridge
//!   --config FILE     Load connection settings from a JSON file
//!   --pin N           IO pin to read on each node (default: 2)
//!   --listen SECS     Seconds to print received packets (default: 10)
//!   --max-discovery MS  Upper bound on discovery time
//!
//! Set RUST_LOG=xbee_core=debug to see frame traffic.

use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use xbee_core::prelude::*;
use xbee_core::protocol::{list_ports, TcpChannel};

/// Command-line options
#[derive(Debug, Default)]
struct Options {
    port_name: Option<String>,
    baud_rate: Option<u32>,
    tcp_addr: Option<String>,
    config_path: Option<String>,
    pin: Option<u8>,
    listen_secs: Option<u64>,
    max_discovery_ms: Option<u64>,
    help: bool,
}

impl Options {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut options = Options::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        options.port_name = Some(args[i].clone());
                    }
                }
                "--baud" | "-b" => {
                    i += 1;
                    if i < args.len() {
                        options.baud_rate = args[i].parse().ok();
                    }
                }
                "--tcp" => {
                    i += 1;
                    if i < args.len() {
                        options.tcp_addr = Some(args[i].clone());
                    }
                }
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        options.config_path = Some(args[i].clone());
                    }
                }
                "--pin" => {
                    i += 1;
                    if i < args.len() {
                        options.pin = args[i].parse().ok();
                    }
                }
                "--listen" | "-l" => {
                    i += 1;
                    if i < args.len() {
                        options.listen_secs = args[i].parse().ok();
                    }
                }
                "--max-discovery" => {
                    i += 1;
                    if i < args.len() {
                        options.max_discovery_ms = args[i].parse().ok();
                    }
                }
                "--help" | "-h" => options.help = true,
                other if !other.starts_with('-') => {
                    options.port_name = Some(other.to_string());
                }
                other => bail!("unknown option {}", other),
            }
            i += 1;
        }
        Ok(options)
    }

    /// Overlay command-line settings on a loaded or default config
    fn apply(&self, config: &mut ConnectionConfig) {
        if let Some(name) = &self.port_name {
            config.port_name = name.clone();
        }
        if let Some(rate) = self.baud_rate {
            config.baud_rate = rate;
        }
        if self.max_discovery_ms.is_some() {
            config.max_discovery_ms = self.max_discovery_ms;
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = Options::parse(&args)?;
    if options.help {
        println!(
            "Usage: discover [--port PORT] [--baud RATE] [--tcp HOST:PORT] [--config FILE] \
             [--pin N] [--listen SECS] [--max-discovery MS]"
        );
        return Ok(());
    }
    let pin = options.pin.unwrap_or(2);
    let listen_secs = options.listen_secs.unwrap_or(10);

    let mut config = match &options.config_path {
        Some(path) => ConnectionConfig::load(path).with_context(|| format!("loading {}", path))?,
        None => ConnectionConfig::default(),
    };
    options.apply(&mut config);

    let mut conn = match options.tcp_addr {
        Some(addr) => {
            println!("Connecting to bridge at {}", addr);
            let channel = TcpChannel::connect(&addr)
                .with_context(|| format!("connecting to {}", addr))?;
            Connection::with_channel(Box::new(channel), config)
        }
        None => {
            if config.port_name.is_empty() {
                let ports = list_ports();
                match ports.first() {
                    Some(port) => config.port_name = port.name.clone(),
                    None => bail!("no serial ports found; pass --port"),
                }
            }
            println!("Opening {} at {} baud", config.port_name, config.baud_rate);
            let mut conn = Connection::new(config);
            conn.connect().context("opening radio")?;
            conn
        }
    };

    let identifier = conn.node_identifier().context("reading NI")?;
    println!("Local radio: {:?}", identifier);

    let started = Instant::now();
    let nodes = conn.discover_nodes().context("discovering nodes")?;
    println!(
        "Discovered {} node(s) in {:.1}s",
        nodes.len(),
        started.elapsed().as_secs_f64()
    );

    for node in &nodes {
        println!(
            "  {:016X} {:<20} net={:04X} type={:?}",
            node.address, node.identifier, node.network_address, node.device_type
        );
        match conn.read_pin(node.target(), pin) {
            Ok(value) => println!("    pin {} = {}", pin, value),
            Err(e) => println!("    pin {}: {}", pin, e),
        }
    }

    println!("Listening for {}s...", listen_secs);
    let until = Instant::now() + Duration::from_secs(listen_secs);
    while Instant::now() < until {
        for packet in conn.drain() {
            match packet {
                Ok(packet) => println!(
                    "  {:016X} rssi=-{}dBm {:02X?}",
                    packet.source_address, packet.rssi, packet.payload
                ),
                Err(e) if e.kind() == ErrorKind::Transport => return Err(e.into()),
                Err(e) => println!("  dropped frame: {}", e),
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let (tx_frames, rx_frames, tx_bytes, rx_bytes) = conn.counters();
    println!(
        "tx {} frames / {} bytes, rx {} frames / {} bytes",
        tx_frames, tx_bytes, rx_frames, rx_bytes
    );
    Ok(())
}

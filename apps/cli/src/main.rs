use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hci_core::ble::AdvertisingData;
use hci_core::session::{BringUpConfig, BringUpSession};
use hci_core::transport::SerialPortLink;
use hci_core::{BdAddr, FirmwareImage, Hci, load_firmware};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bluetooth HCI bring-up tool over UART", long_about = None)]
struct Args {
    /// Serial device the controller is attached to
    #[arg(short, long, default_value = "/dev/serial1")]
    port: String,

    /// Host baud rate
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Give up on a controller response after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full bring-up sequence described by a config file
    Bringup {
        /// TOML bring-up configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write a default bring-up configuration
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
    /// Download a vendor firmware patch (HCD)
    LoadFirmware {
        /// Firmware image
        image: PathBuf,
        /// Pause after the download, in microseconds
        #[arg(long, default_value_t = hci_core::protocol::FIRMWARE_SETTLE_US)]
        settle_us: u64,
    },
    /// Summarize a firmware image without touching the controller
    Inspect {
        /// Firmware image
        image: PathBuf,
    },
    /// Reset the controller
    Reset,
    /// Print the controller's public address
    ReadAddr,
    /// Start active scanning
    Scan,
    /// Start non-connectable Eddystone-URL advertising
    Advertise {
        /// URL to advertise instead of the built-in one
        #[arg(long)]
        url: Option<String>,
        /// Calibrated tx power at 0 m, dBm
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        tx_power: i8,
    },
    /// Initiate a connection to a peer
    Connect {
        /// Peer address, e.g. A0:A1:A2:A3:A4:A5
        peer: BdAddr,
    },
    /// Stop scanning and advertising
    Stop,
    /// Enable notifications on an established connection
    Subscribe {
        /// Connection handle (decimal or 0x-prefixed hex)
        #[arg(value_parser = parse_u16)]
        handle: u16,
        /// CCCD attribute handle
        #[arg(long, value_parser = parse_u16)]
        cccd: Option<u16>,
    },
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid 16-bit value '{}': {}", s, e))
}

fn open_hci(args: &Args) -> Result<Hci<SerialPortLink>> {
    let link = SerialPortLink::open(&args.port, args.baud)?;
    let mut hci = Hci::new(link);
    hci.set_response_timeout(args.timeout_ms.map(Duration::from_millis));
    Ok(hci)
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Command::Bringup { config } => {
            let mut config = BringUpConfig::load_from_file(config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            if args.timeout_ms.is_some() {
                config.response_timeout_ms = args.timeout_ms;
            }
            let link = SerialPortLink::open(&args.port, args.baud)?;
            let report = BringUpSession::new(config).run(link)?;
            print!("{report}");
            if let Some(addr) = report.bd_addr {
                println!("Controller address: {addr}");
            }
            if !report.is_success() {
                anyhow::bail!("{} bring-up step(s) failed", report.failures());
            }
        }
        Command::InitConfig { path } => {
            BringUpConfig::default().save_to_file(path)?;
            info!(path = %path.display(), "Wrote default configuration");
        }
        Command::LoadFirmware { image, settle_us } => {
            let data = std::fs::read(image)
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let mut hci = open_hci(args)?;
            let report = load_firmware(
                &mut hci,
                &FirmwareImage::new(&data),
                Duration::from_micros(*settle_us),
            )?;
            println!("Downloaded {} records ({} bytes)", report.records, report.bytes);
        }
        Command::Inspect { image } => {
            let data = std::fs::read(image)
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let summary = FirmwareImage::new(&data).summary()?;
            println!("{}", image.display());
            println!("  Size:     {} bytes", summary.bytes);
            println!("  Records:  {}", summary.records);
            println!("  Payload:  {} bytes", summary.payload_bytes);
            for (opcode, count) in &summary.by_opcode {
                println!("  {:?}: {}", opcode, count);
            }
        }
        Command::Reset => {
            open_hci(args)?.reset()?;
            println!("Controller reset");
        }
        Command::ReadAddr => {
            let addr = open_hci(args)?.read_bd_addr()?;
            println!("{addr}");
        }
        Command::Scan => open_hci(args)?.start_active_scanning()?,
        Command::Advertise { url, tx_power } => {
            let data = match url {
                Some(url) => AdvertisingData::eddystone_url(url, *tx_power)?,
                None => AdvertisingData::default(),
            };
            open_hci(args)?.start_advertising_with(&data)?;
        }
        Command::Connect { peer } => open_hci(args)?.connect(*peer)?,
        Command::Stop => {
            let mut hci = open_hci(args)?;
            // One may already be off; try both.
            if let Err(e) = hci.stop_scanning() {
                warn!("Stop scanning failed: {}", e);
            }
            if let Err(e) = hci.stop_advertising() {
                warn!("Stop advertising failed: {}", e);
            }
        }
        Command::Subscribe { handle, cccd } => {
            let mut hci = open_hci(args)?;
            match cccd {
                Some(cccd) => hci.send_subscribe_to(*handle, *cccd)?,
                None => hci.send_subscribe(*handle)?,
            }
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = %args.port, baud = args.baud, "Starting hcictl");

    if let Err(e) = run(&args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

//! scand - optical code scan daemon
//!
//! Demo driver for the scan kernel:
//! 1. Loads configuration (file, environment, CLI flags)
//! 2. Announces available camera devices
//! 3. Starts a scan session and pumps the loop until a code is decoded
//!    (or forever, with --continuous)
//! 4. Tears the session down on Ctrl-C
//!
//! With the `camera-v4l2` feature the daemon scans a real local camera;
//! without it a synthetic stub platform stands in, with a scripted decoder
//! so the full pipeline can be observed end to end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use codescan::{
    DeviceBroker, DeviceSelection, ScanEvent, ScanLoop, ScanState, ScandConfig, StubDecoder,
    WallClockScheduler,
};

#[cfg(feature = "camera-v4l2")]
use codescan::{V4l2Config, V4l2Platform};

#[cfg(not(feature = "camera-v4l2"))]
use codescan::StubPlatform;

#[derive(Parser, Debug)]
#[command(name = "scand", about = "Optical code scan daemon")]
struct Args {
    /// Camera device to scan (platform default when omitted).
    #[arg(long)]
    device: Option<String>,

    /// Keep scanning after the first successful decode.
    #[arg(long)]
    continuous: bool,

    /// Delay between capture attempts, in milliseconds.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Emit per-tick debug logs.
    #[arg(long)]
    debug: bool,

    /// List available devices and exit.
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = ScandConfig::load()?;
    if let Some(device) = &args.device {
        cfg.device = Some(DeviceSelection::new(device.clone()));
    }
    if args.continuous {
        cfg.scan.continuous = true;
    }
    if let Some(ms) = args.poll_interval_ms {
        cfg.scan.poll_interval = Duration::from_millis(ms);
    }
    if args.debug {
        cfg.scan.debug_logging = true;
    }
    cfg.scan.validate()?;

    #[cfg(feature = "camera-v4l2")]
    let platform = V4l2Platform::new(V4l2Config {
        width: cfg.scan.target_dimensions.width,
        height: cfg.scan.target_dimensions.height,
        ..V4l2Config::default()
    });

    #[cfg(not(feature = "camera-v4l2"))]
    let platform = {
        let mut platform = StubPlatform::new();
        platform.set_auto_resolve(true);
        platform
    };

    // No real decoding algorithm ships with the kernel; the demo uses a
    // scripted decoder so the scheduling behaviour is observable.
    let decoder = StubDecoder::failures_then(5, "CODESCAN-DEMO");

    run(args.list_devices, cfg, platform, decoder)
}

fn run<P: codescan::CameraPlatform>(
    list_only: bool,
    cfg: ScandConfig,
    platform: P,
    decoder: StubDecoder,
) -> Result<()> {
    let (_selection_tx, selection_rx) = mpsc::channel::<DeviceSelection>();
    let broker = DeviceBroker::new(selection_rx);
    let mut scan = ScanLoop::new(cfg.scan.clone(), platform, WallClockScheduler::new(), decoder);

    if !scan.supported() {
        log::error!("scand: no usable capture surface, exiting");
        return Ok(());
    }

    scan.announce_devices();

    if list_only {
        while let Some(event) = scan.poll_event() {
            if let ScanEvent::DevicesFound(devices) = event {
                for device in devices {
                    println!("{}\t{}", device.device_id, device.label);
                }
            }
        }
        return Ok(());
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    log::info!(
        "scand: starting scan (continuous={}, interval={}ms)",
        cfg.scan.continuous,
        cfg.scan.poll_interval.as_millis()
    );
    scan.start(cfg.device.clone());

    while running.load(Ordering::SeqCst) {
        broker.drain_selections(&mut scan);
        scan.pump();

        while let Some(event) = scan.poll_event() {
            match event {
                ScanEvent::Decoded(text) => {
                    println!("{}", text);
                    log::info!("scand: decoded {:?}", text);
                }
                ScanEvent::DevicesFound(devices) => {
                    log::info!("scand: {} camera device(s) available", devices.len());
                }
                ScanEvent::AcquisitionFailed(error) => {
                    log::error!("scand: could not acquire a stream: {}", error);
                    return Ok(());
                }
            }
        }

        if scan.state() == ScanState::Stopped {
            // One-shot session finished.
            break;
        }

        std::thread::sleep(Duration::from_millis(10));
    }

    // Unconditional teardown: never leave a stream or timer behind.
    scan.stop();
    log::info!("scand: stopped");
    Ok(())
}

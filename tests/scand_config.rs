use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use codescan::config::ScandConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CODESCAN_CONFIG",
        "CODESCAN_DEVICE",
        "CODESCAN_POLL_INTERVAL_MS",
        "CODESCAN_CONTINUOUS",
        "CODESCAN_DEBUG_LOGGING",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "device": "cam-front",
        "scan": {
            "width": 800,
            "height": 600,
            "poll_interval_ms": 250,
            "continuous": true,
            "debug_logging": false
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("CODESCAN_CONFIG", file.path());
    std::env::set_var("CODESCAN_DEVICE", "cam-rear");
    std::env::set_var("CODESCAN_DEBUG_LOGGING", "true");

    let cfg = ScandConfig::load().expect("load config");

    assert_eq!(cfg.device.unwrap().device_id, "cam-rear");
    assert_eq!(cfg.scan.target_dimensions.width, 800);
    assert_eq!(cfg.scan.target_dimensions.height, 600);
    assert_eq!(cfg.scan.poll_interval, Duration::from_millis(250));
    assert!(cfg.scan.continuous);
    assert!(cfg.scan.debug_logging);

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ScandConfig::load().expect("load config");

    assert!(cfg.device.is_none());
    assert_eq!(cfg.scan.target_dimensions.width, 640);
    assert_eq!(cfg.scan.target_dimensions.height, 480);
    assert_eq!(cfg.scan.poll_interval, Duration::from_millis(500));
    assert!(!cfg.scan.continuous);
    assert!(!cfg.scan.debug_logging);

    clear_env();
}

#[test]
fn zero_interval_from_env_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CODESCAN_POLL_INTERVAL_MS", "0");
    assert!(ScandConfig::load().is_err());

    clear_env();
}

//! Device enumeration and selection relay.
//!
//! Device listing is best-effort: a host without enumeration support, or an
//! enumeration failure, yields an empty list and never blocks scanning.
//! Selections arrive from an external source (UI, CLI) over a channel and
//! each one (re)starts the scan loop on that device.

use std::sync::mpsc::Receiver;

use crate::decode::Decoder;
use crate::platform::CameraPlatform;
use crate::scan::ScanLoop;
use crate::timer::Scheduler;
use crate::{DeviceDescriptor, DeviceSelection};

/// Relays device selections into the scan loop.
pub struct DeviceBroker {
    selections: Receiver<DeviceSelection>,
}

impl DeviceBroker {
    pub fn new(selections: Receiver<DeviceSelection>) -> Self {
        Self { selections }
    }

    /// List available camera devices. Never fails: enumeration errors are
    /// logged and absorbed into an empty list.
    pub fn list_devices<P: CameraPlatform>(platform: &mut P) -> Vec<DeviceDescriptor> {
        match platform.enumerate_devices() {
            Ok(devices) => devices,
            Err(error) => {
                log::warn!("DeviceBroker: device enumeration failed: {}", error);
                Vec::new()
            }
        }
    }

    /// Forward every queued selection into the scan loop. Each selection
    /// starts a fresh session (the loop tears down the previous one).
    pub fn drain_selections<P, S, D>(&self, scan: &mut ScanLoop<P, S, D>)
    where
        P: CameraPlatform,
        S: Scheduler,
        D: Decoder,
    {
        while let Ok(selection) = self.selections.try_recv() {
            log::info!("DeviceBroker: switching to device {}", selection.device_id);
            scan.start(Some(selection));
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::StubDecoder;
    use crate::platform::StubPlatform;
    use crate::scan::ScanState;
    use crate::stream::FacingMode;
    use crate::timer::ManualScheduler;
    use crate::ScanConfig;
    use std::sync::mpsc;

    #[test]
    fn list_devices_absorbs_enumeration_failure() {
        let mut platform = StubPlatform::failing_enumeration();
        let devices = DeviceBroker::list_devices(&mut platform);
        assert!(devices.is_empty());
    }

    #[test]
    fn list_devices_returns_the_platform_list() {
        let mut platform = StubPlatform::new();
        let devices = DeviceBroker::list_devices(&mut platform);
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn drained_selection_starts_the_loop_on_that_device() {
        let (tx, rx) = mpsc::channel();
        let broker = DeviceBroker::new(rx);
        let mut scan = ScanLoop::new(
            ScanConfig::default(),
            StubPlatform::new(),
            ManualScheduler::new(),
            StubDecoder::always_failing(),
        );

        tx.send(DeviceSelection::new("cam-7")).unwrap();
        broker.drain_selections(&mut scan);

        assert_eq!(scan.state(), ScanState::Acquiring);
        let requests = scan.platform().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].facing, FacingMode::RearExact);
        assert_eq!(
            requests[0].selection.as_ref().map(|s| s.device_id.as_str()),
            Some("cam-7")
        );
    }

    #[test]
    fn empty_channel_drains_nothing() {
        let (_tx, rx) = mpsc::channel::<DeviceSelection>();
        let broker = DeviceBroker::new(rx);
        let mut scan = ScanLoop::new(
            ScanConfig::default(),
            StubPlatform::new(),
            ManualScheduler::new(),
            StubDecoder::always_failing(),
        );
        broker.drain_selections(&mut scan);
        assert_eq!(scan.state(), ScanState::Idle);
    }
}

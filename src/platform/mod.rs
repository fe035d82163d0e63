//! Camera capability backends.
//!
//! This module abstracts the host camera capability behind `CameraPlatform`:
//! - enumerating available devices,
//! - requesting a live stream for a set of constraints,
//! - delivering acquisition completions.
//!
//! Acquisition is the one operation that suspends on the outside world (a
//! permission prompt, a device opening); its completion may arrive
//! arbitrarily late. The platform therefore hands back a ticket at request
//! time and delivers the outcome later through `poll_acquisition`. Whether a
//! late completion is still wanted is the caller's problem - the scan loop
//! guards against stale tickets.
//!
//! Backends:
//! - `StubPlatform`: fully scripted, for tests and the demo daemon
//! - `V4l2Platform` (feature `camera-v4l2`): local V4L2 devices

mod stub;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use stub::StubPlatform;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::{V4l2Config, V4l2Platform};

use anyhow::Result;

use crate::stream::{CameraStream, StreamConstraints};
use crate::{AcquisitionError, CaptureFailure, DeviceDescriptor};

/// One decode-ready video frame, row-major RGB.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// A live video source bound to one acquired stream.
pub trait VideoSource {
    /// Read the current frame. Fails with `FrameNotReady` when the source
    /// has nothing to offer yet; that is routine, not an error.
    fn read_frame(&mut self) -> Result<VideoFrame, CaptureFailure>;

    /// Stop the source and release the underlying device. Idempotent.
    fn stop(&mut self);

    /// Whether the source is still delivering frames.
    fn is_live(&self) -> bool;
}

/// Token identifying one in-flight stream acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AcquireTicket(u64);

impl AcquireTicket {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

/// Host camera capability.
pub trait CameraPlatform {
    /// List available camera devices. May fail; callers that must not fail
    /// (device listing is best-effort) absorb the error into an empty list.
    fn enumerate_devices(&mut self) -> Result<Vec<DeviceDescriptor>>;

    /// Begin acquiring a stream for `constraints`. Never blocks; the outcome
    /// arrives later via `poll_acquisition`.
    fn request_stream(&mut self, constraints: StreamConstraints) -> AcquireTicket;

    /// Pop one resolved acquisition, if any.
    fn poll_acquisition(
        &mut self,
    ) -> Option<(AcquireTicket, Result<CameraStream, AcquisitionError>)>;
}

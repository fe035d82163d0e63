//! codescan - optical code scan kernel
//!
//! This crate implements the capture-decode scheduling loop for ad-hoc
//! optical-code scanning against a live camera feed.
//!
//! # Architecture
//!
//! Frames flow through a single cooperative pipeline:
//!
//! 1. A `DeviceSelection` (or none, meaning "platform default") is mapped to
//!    stream constraints and handed to the `StreamController`.
//! 2. The platform resolves the acquisition asynchronously; the `ScanLoop`
//!    binds the resulting `CameraStream` only if the session that requested
//!    it is still the active one.
//! 3. On each capture tick the current frame is copied into the `FrameSink`
//!    and the `Decoder` runs over the sink's pixels.
//! 4. A successful decode is emitted to the consumer; a failed attempt is
//!    absorbed and the tick is re-armed after the poll interval.
//!
//! Scheduling is fixed-delay, not fixed-rate: the next tick is armed only
//! after the previous attempt completes, so decode latency stretches the
//! effective period instead of stacking overlapping attempts.
//!
//! # Module Structure
//!
//! - `scan`: the ScanLoop state machine (core)
//! - `stream`: StreamController, CameraStream, constraint mapping
//! - `sink`: FrameSink pixel buffer target
//! - `decode`: Decoder seam and DecodeResult
//! - `platform`: camera capability backends (stub, V4L2)
//! - `devices`: device enumeration and selection relay
//! - `timer`: one-shot fixed-delay scheduler
//! - `config`: scan and daemon configuration

use serde::{Deserialize, Serialize};

pub mod config;
pub mod decode;
pub mod devices;
pub mod platform;
pub mod scan;
pub mod sink;
pub mod stream;
pub mod timer;

pub use config::{ScanConfig, ScandConfig};
pub use decode::{DecodeResult, Decoder, StubDecoder};
pub use devices::DeviceBroker;
pub use platform::{AcquireTicket, CameraPlatform, StubPlatform, VideoFrame, VideoSource};
#[cfg(feature = "camera-v4l2")]
pub use platform::{V4l2Config, V4l2Platform};
pub use scan::{ScanEvent, ScanLoop, ScanState};
pub use sink::FrameSink;
pub use stream::{CameraStream, FacingMode, StreamConstraints, StreamController};
pub use timer::{ManualScheduler, Scheduler, TimerHandle, WallClockScheduler};

// -------------------- Devices --------------------

/// An available camera device, as reported by the platform.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub label: String,
}

/// A requested camera device. Absence (`Option::None` at the call sites)
/// means "use the platform default".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSelection {
    pub device_id: String,
}

impl DeviceSelection {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

/// Target frame dimensions for the capture surface.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

// -------------------- Error Taxonomy --------------------

/// Stream acquisition failed. Surfaced once to the consumer; never retried
/// automatically (the consumer may retry with a different selection).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquisitionError {
    /// No device satisfies the requested constraints.
    NoMatchingDevice,
    /// The platform refused access to the camera.
    PermissionDenied,
    /// The host has no camera capability at all.
    NoCameraCapability,
    /// Backend-specific failure.
    Backend(String),
}

impl std::fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionError::NoMatchingDevice => write!(f, "no matching camera device"),
            AcquisitionError::PermissionDenied => write!(f, "camera permission denied"),
            AcquisitionError::NoCameraCapability => write!(f, "host has no camera capability"),
            AcquisitionError::Backend(msg) => write!(f, "camera backend failure: {}", msg),
        }
    }
}

impl std::error::Error for AcquisitionError {}

/// A capture attempt failed. Routine and expected (the stream may not have
/// a frame yet, or no code is visible); always absorbed by the retry loop
/// and never surfaced to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureFailure {
    /// The stream has no frame available yet.
    FrameNotReady,
    /// Copying the frame into the sink failed.
    Draw(String),
    /// The decoder found no decodable code in the frame.
    Decode(String),
}

impl std::fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureFailure::FrameNotReady => write!(f, "frame not ready"),
            CaptureFailure::Draw(msg) => write!(f, "frame draw failed: {}", msg),
            CaptureFailure::Decode(msg) => write!(f, "decode failed: {}", msg),
        }
    }
}

impl std::error::Error for CaptureFailure {}

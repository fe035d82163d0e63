//! Stream acquisition and release.
//!
//! `StreamController` maps a device selection to stream constraints, hands
//! the request to the platform, and guarantees clean release of any stream it
//! is given back. It never holds a stream itself; ownership lives with the
//! scan session.

use crate::platform::{AcquireTicket, CameraPlatform, VideoFrame, VideoSource};
use crate::{AcquisitionError, CaptureFailure, DeviceSelection};

/// Camera facing requested from the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacingMode {
    /// Any available camera.
    Any,
    /// Rear-facing camera, exact match required.
    RearExact,
}

/// Constraints for one stream acquisition. Audio is never requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub selection: Option<DeviceSelection>,
    pub audio: bool,
}

impl StreamConstraints {
    pub fn any_camera() -> Self {
        Self {
            facing: FacingMode::Any,
            selection: None,
            audio: false,
        }
    }

    /// Map a device selection to constraints.
    ///
    /// An explicit selection constrains to a rear-facing camera with an exact
    /// match; no selection requests any camera. The asymmetry is a workaround
    /// for a platform quirk, kept in this one place so it can be revisited
    /// without touching the loop.
    pub fn for_selection(selection: Option<&DeviceSelection>) -> Self {
        match selection {
            Some(selection) => Self {
                facing: FacingMode::RearExact,
                selection: Some(selection.clone()),
                audio: false,
            },
            None => Self::any_camera(),
        }
    }
}

// ----------------------------------------------------------------------------
// CameraStream
// ----------------------------------------------------------------------------

/// A live camera stream. Owns its video source; stopping is idempotent.
pub struct CameraStream {
    source: Box<dyn VideoSource>,
    stopped: bool,
}

impl CameraStream {
    pub fn new(source: Box<dyn VideoSource>) -> Self {
        Self {
            source,
            stopped: false,
        }
    }

    /// Read the stream's current frame.
    pub fn read_frame(&mut self) -> Result<VideoFrame, CaptureFailure> {
        if self.stopped {
            return Err(CaptureFailure::FrameNotReady);
        }
        self.source.read_frame()
    }

    /// Stop the source if it is still delivering. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if !self.stopped {
            if self.source.is_live() {
                self.source.stop();
            }
            self.stopped = true;
        }
    }

    pub fn is_live(&self) -> bool {
        !self.stopped && self.source.is_live()
    }
}

// ----------------------------------------------------------------------------
// StreamController
// ----------------------------------------------------------------------------

/// Maps device selections to acquisitions and releases streams cleanly.
pub struct StreamController<P> {
    platform: P,
}

impl<P: CameraPlatform> StreamController<P> {
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    /// Request a stream matching the selection's constraints. The outcome
    /// arrives later via `poll`.
    pub fn acquire(&mut self, selection: Option<&DeviceSelection>) -> AcquireTicket {
        let constraints = StreamConstraints::for_selection(selection);
        log::debug!("StreamController: requesting stream, {:?}", constraints);
        self.platform.request_stream(constraints)
    }

    /// Pop one resolved acquisition, if any.
    pub fn poll(&mut self) -> Option<(AcquireTicket, Result<CameraStream, AcquisitionError>)> {
        self.platform.poll_acquisition()
    }

    /// Release a stream. Releasing `None` (nothing was ever acquired, or the
    /// stream was already taken) is a no-op.
    pub fn release(&mut self, stream: Option<CameraStream>) {
        if let Some(mut stream) = stream {
            stream.stop();
            log::debug!("StreamController: stream released");
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StubPlatform;

    #[test]
    fn explicit_selection_requests_rear_camera_exactly() {
        let selection = DeviceSelection::new("cam-42");
        let constraints = StreamConstraints::for_selection(Some(&selection));
        assert_eq!(constraints.facing, FacingMode::RearExact);
        assert_eq!(constraints.selection, Some(selection));
        assert!(!constraints.audio);
    }

    #[test]
    fn no_selection_requests_any_camera() {
        let constraints = StreamConstraints::for_selection(None);
        assert_eq!(constraints.facing, FacingMode::Any);
        assert_eq!(constraints.selection, None);
        assert!(!constraints.audio);
    }

    #[test]
    fn release_none_is_a_no_op() {
        let mut controller = StreamController::new(StubPlatform::new());
        controller.release(None);
        controller.release(None);
    }

    #[test]
    fn release_stops_the_stream_once() {
        let mut controller = StreamController::new(StubPlatform::new());
        controller.acquire(None);
        controller.platform_mut().resolve_next_ok().unwrap();
        let (_, result) = controller.poll().unwrap();
        let stream = result.unwrap();
        assert_eq!(controller.platform().live_stream_count(), 1);

        controller.release(Some(stream));
        assert_eq!(controller.platform().live_stream_count(), 0);
    }

    #[test]
    fn stopped_stream_reads_fail_as_not_ready() {
        let mut controller = StreamController::new(StubPlatform::new());
        controller.acquire(None);
        controller.platform_mut().resolve_next_ok().unwrap();
        let (_, result) = controller.poll().unwrap();
        let mut stream = result.unwrap();

        stream.stop();
        assert!(!stream.is_live());
        assert_eq!(stream.read_frame(), Err(CaptureFailure::FrameNotReady));
    }
}

//! Scripted camera platform for tests and the demo daemon.
//!
//! Acquisitions do not resolve on their own: a test (or the demo driver, via
//! `auto_resolve`) decides when and how each request completes. This is what
//! makes the late-resolution races in the scan loop reproducible.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::{AcquireTicket, CameraPlatform, VideoFrame, VideoSource};
use crate::stream::{CameraStream, StreamConstraints};
use crate::{AcquisitionError, CaptureFailure, DeviceDescriptor, Dimensions};

/// Scripted camera platform.
pub struct StubPlatform {
    devices: Vec<DeviceDescriptor>,
    enumeration_fails: bool,
    auto_resolve: bool,
    frame_dimensions: Dimensions,
    next_ticket: u64,
    pending: VecDeque<(AcquireTicket, StreamConstraints)>,
    completed: VecDeque<(AcquireTicket, Result<CameraStream, AcquisitionError>)>,
    requests: Vec<StreamConstraints>,
    live_streams: Arc<AtomicUsize>,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self {
            devices: vec![DeviceDescriptor {
                device_id: "stub:cam0".to_string(),
                label: "Stub Camera 0".to_string(),
            }],
            enumeration_fails: false,
            auto_resolve: false,
            frame_dimensions: Dimensions::default(),
            next_ticket: 1,
            pending: VecDeque::new(),
            completed: VecDeque::new(),
            requests: Vec::new(),
            live_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            ..Self::new()
        }
    }

    /// A platform whose device enumeration always fails.
    pub fn failing_enumeration() -> Self {
        Self {
            enumeration_fails: true,
            ..Self::new()
        }
    }

    /// Resolve each request successfully the moment it is made.
    pub fn set_auto_resolve(&mut self, auto_resolve: bool) {
        self.auto_resolve = auto_resolve;
    }

    /// Dimensions of the synthetic frames produced by acquired streams.
    pub fn set_frame_dimensions(&mut self, dimensions: Dimensions) {
        self.frame_dimensions = dimensions;
    }

    /// Resolve the oldest outstanding request with a live synthetic stream.
    /// Returns the resolved ticket.
    pub fn resolve_next_ok(&mut self) -> Result<AcquireTicket> {
        let (ticket, _constraints) = self
            .pending
            .pop_front()
            .ok_or_else(|| anyhow!("no pending acquisition to resolve"))?;
        let stream = self.make_stream();
        self.completed.push_back((ticket, Ok(stream)));
        Ok(ticket)
    }

    /// Resolve the oldest outstanding request with an acquisition failure.
    pub fn resolve_next_err(&mut self, error: AcquisitionError) -> Result<AcquireTicket> {
        let (ticket, _constraints) = self
            .pending
            .pop_front()
            .ok_or_else(|| anyhow!("no pending acquisition to resolve"))?;
        self.completed.push_back((ticket, Err(error)));
        Ok(ticket)
    }

    /// Constraints of every request made so far, in order.
    pub fn requests(&self) -> &[StreamConstraints] {
        &self.requests
    }

    /// Requests not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Streams handed out and not yet stopped. The leak detector for tests.
    pub fn live_stream_count(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    fn make_stream(&self) -> CameraStream {
        let source = StubVideoSource::new(self.frame_dimensions, self.live_streams.clone());
        CameraStream::new(Box::new(source))
    }
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraPlatform for StubPlatform {
    fn enumerate_devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        if self.enumeration_fails {
            return Err(anyhow!("device enumeration unsupported"));
        }
        Ok(self.devices.clone())
    }

    fn request_stream(&mut self, constraints: StreamConstraints) -> AcquireTicket {
        let ticket = AcquireTicket::new(self.next_ticket);
        self.next_ticket += 1;
        self.requests.push(constraints.clone());
        if self.auto_resolve {
            let stream = self.make_stream();
            self.completed.push_back((ticket, Ok(stream)));
        } else {
            self.pending.push_back((ticket, constraints));
        }
        ticket
    }

    fn poll_acquisition(
        &mut self,
    ) -> Option<(AcquireTicket, Result<CameraStream, AcquisitionError>)> {
        self.completed.pop_front()
    }
}

// ----------------------------------------------------------------------------
// Synthetic video source
// ----------------------------------------------------------------------------

struct StubVideoSource {
    dimensions: Dimensions,
    frame_count: u64,
    stopped: bool,
    live_streams: Arc<AtomicUsize>,
}

impl StubVideoSource {
    fn new(dimensions: Dimensions, live_streams: Arc<AtomicUsize>) -> Self {
        live_streams.fetch_add(1, Ordering::SeqCst);
        Self {
            dimensions,
            frame_count: 0,
            stopped: false,
            live_streams,
        }
    }

    /// Generate synthetic pixel data.
    ///
    /// Intentionally simple: a pattern mixing position and frame count so
    /// consecutive frames differ.
    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let pixel_count =
            (self.dimensions.width as usize) * (self.dimensions.height as usize) * 3;
        let seed: u64 = rand::random();
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + (seed % 251)) % 256) as u8;
        }
        pixels
    }
}

impl VideoSource for StubVideoSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CaptureFailure> {
        if self.stopped {
            return Err(CaptureFailure::FrameNotReady);
        }
        self.frame_count += 1;
        Ok(VideoFrame {
            width: self.dimensions.width,
            height: self.dimensions.height,
            data: self.generate_synthetic_pixels(),
        })
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped
    }
}

impl Drop for StubVideoSource {
    fn drop(&mut self) {
        self.stop();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_acquisition_resolves_on_demand() {
        let mut platform = StubPlatform::new();
        let ticket = platform.request_stream(StreamConstraints::any_camera());

        assert!(platform.poll_acquisition().is_none());
        let resolved = platform.resolve_next_ok().unwrap();
        assert_eq!(resolved, ticket);

        let (completed, result) = platform.poll_acquisition().unwrap();
        assert_eq!(completed, ticket);
        assert!(result.is_ok());
        assert_eq!(platform.live_stream_count(), 1);
    }

    #[test]
    fn stopping_a_stream_decrements_live_count() {
        let mut platform = StubPlatform::new();
        platform.request_stream(StreamConstraints::any_camera());
        platform.resolve_next_ok().unwrap();
        let (_, result) = platform.poll_acquisition().unwrap();

        let mut stream = result.unwrap();
        assert_eq!(platform.live_stream_count(), 1);
        stream.stop();
        stream.stop();
        assert_eq!(platform.live_stream_count(), 0);
    }

    #[test]
    fn stub_stream_produces_frames() {
        let mut platform = StubPlatform::new();
        platform.request_stream(StreamConstraints::any_camera());
        platform.resolve_next_ok().unwrap();
        let (_, result) = platform.poll_acquisition().unwrap();
        let mut stream = result.unwrap();

        let frame = stream.read_frame().unwrap();
        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
        assert_eq!(frame.data.len(), 640 * 480 * 3);
    }

    #[test]
    fn failed_resolution_reports_the_error() {
        let mut platform = StubPlatform::new();
        platform.request_stream(StreamConstraints::any_camera());
        platform
            .resolve_next_err(AcquisitionError::PermissionDenied)
            .unwrap();

        let (_, result) = platform.poll_acquisition().unwrap();
        match result {
            Err(error) => assert_eq!(error, AcquisitionError::PermissionDenied),
            Ok(_) => panic!("expected a failed acquisition"),
        }
        assert_eq!(platform.live_stream_count(), 0);
    }
}

//! V4L2 camera platform (feature `camera-v4l2`).
//!
//! Maps the capability trait onto local V4L2 device nodes. Opening a device
//! is synchronous underneath; completions still flow through the ticket
//! interface so the scan loop sees the same shape as a genuinely
//! asynchronous platform.
//!
//! V4L2 exposes no camera-facing metadata, so a rear-facing-exact constraint
//! cannot be honoured literally; the selected device node is opened instead.

use std::collections::VecDeque;

use anyhow::Result;
use ouroboros::self_referencing;

use super::{AcquireTicket, CameraPlatform, VideoFrame, VideoSource};
use crate::stream::{CameraStream, FacingMode, StreamConstraints};
use crate::{AcquisitionError, CaptureFailure, DeviceDescriptor};

/// Configuration for the V4L2 platform.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path opened when no selection names one.
    pub default_device: String,
    /// Target frame rate requested from the device.
    pub target_fps: u32,
    /// Preferred capture width.
    pub width: u32,
    /// Preferred capture height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            default_device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Camera platform backed by local V4L2 devices.
pub struct V4l2Platform {
    config: V4l2Config,
    next_ticket: u64,
    completed: VecDeque<(AcquireTicket, Result<CameraStream, AcquisitionError>)>,
}

impl V4l2Platform {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            config,
            next_ticket: 1,
            completed: VecDeque::new(),
        }
    }

    fn open_stream(&self, constraints: &StreamConstraints) -> Result<CameraStream, AcquisitionError> {
        let path = match &constraints.selection {
            Some(selection) => {
                if constraints.facing == FacingMode::RearExact {
                    log::debug!("V4l2Platform: facing constraints not expressible, opening node");
                }
                selection.device_id.clone()
            }
            None => self.config.default_device.clone(),
        };
        let source = V4l2VideoSource::open(&path, &self.config).map_err(|err| map_open_error(&path, err))?;
        Ok(CameraStream::new(Box::new(source)))
    }
}

fn map_open_error(path: &str, err: anyhow::Error) -> AcquisitionError {
    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        match io_err.kind() {
            std::io::ErrorKind::PermissionDenied => return AcquisitionError::PermissionDenied,
            std::io::ErrorKind::NotFound => return AcquisitionError::NoMatchingDevice,
            _ => {}
        }
    }
    AcquisitionError::Backend(format!("{}: {}", path, err))
}

impl CameraPlatform for V4l2Platform {
    fn enumerate_devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let nodes = v4l::context::enum_devices();
        let mut devices = Vec::with_capacity(nodes.len());
        for node in nodes {
            let path = node.path().to_string_lossy().to_string();
            let label = node
                .name()
                .unwrap_or_else(|| format!("video{}", node.index()));
            devices.push(DeviceDescriptor {
                device_id: path,
                label,
            });
        }
        Ok(devices)
    }

    fn request_stream(&mut self, constraints: StreamConstraints) -> AcquireTicket {
        let ticket = AcquireTicket::new(self.next_ticket);
        self.next_ticket += 1;
        let result = self.open_stream(&constraints);
        self.completed.push_back((ticket, result));
        ticket
    }

    fn poll_acquisition(
        &mut self,
    ) -> Option<(AcquireTicket, Result<CameraStream, AcquisitionError>)> {
        self.completed.pop_front()
    }
}

// ----------------------------------------------------------------------------
// V4L2 video source
// ----------------------------------------------------------------------------

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

struct V4l2VideoSource {
    path: String,
    state: Option<V4l2State>,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
}

impl V4l2VideoSource {
    fn open(path: &str, config: &V4l2Config) -> Result<Self> {
        use anyhow::Context;
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device =
            v4l::Device::with_path(path).with_context(|| format!("open v4l2 device {}", path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2VideoSource: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2VideoSource: failed to set fps on {}: {}", path, err);
            }
        }

        let active_width = format.width;
        let active_height = format.height;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2VideoSource: opened {} ({}x{})",
            path,
            active_width,
            active_height
        );

        Ok(Self {
            path: path.to_string(),
            state: Some(state),
            active_width,
            active_height,
            frame_count: 0,
        })
    }
}

impl VideoSource for V4l2VideoSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CaptureFailure> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Err(CaptureFailure::FrameNotReady);
        };
        let data = match state
            .with_stream_mut(|stream| stream.next().map(|(buf, _meta)| buf.to_vec()))
        {
            Ok(data) => data,
            Err(err) => {
                log::debug!("V4l2VideoSource: capture on {} failed: {}", self.path, err);
                return Err(CaptureFailure::FrameNotReady);
            }
        };
        self.frame_count += 1;
        Ok(VideoFrame {
            width: self.active_width,
            height: self.active_height,
            data,
        })
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2VideoSource: closed {} after {} frames",
                self.path,
                self.frame_count
            );
        }
    }

    fn is_live(&self) -> bool {
        self.state.is_some()
    }
}

//! The capture-decode scheduling loop.
//!
//! `ScanLoop` owns the full pipeline for one session at a time: it issues the
//! stream acquisition, binds the stream when (and only when) the requesting
//! session is still active, samples frames on a fixed-delay timer, and tears
//! everything down on stop. Capture failures are routine and absorbed; only a
//! successful decode reaches the consumer.
//!
//! Everything runs on one cooperative context. The owner pumps the loop
//! (`pump`) to deliver acquisition completions and fire due timers; no two
//! capture ticks for a session can ever overlap.

use std::collections::VecDeque;

use crate::decode::{DecodeResult, Decoder};
use crate::devices::DeviceBroker;
use crate::platform::{AcquireTicket, CameraPlatform};
use crate::sink::FrameSink;
use crate::stream::{CameraStream, StreamController};
use crate::timer::{Scheduler, TimerHandle};
use crate::{AcquisitionError, DeviceDescriptor, DeviceSelection, ScanConfig};

/// Observable state of the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    /// No session.
    Idle,
    /// Stream requested, not yet available.
    Acquiring,
    /// Stream live, frames being sampled.
    Scanning,
    /// Terminal for a one-shot session; a new `start` begins fresh.
    Stopped,
}

/// Events emitted to the consumer, drained via `poll_event`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    /// A code was decoded.
    Decoded(String),
    /// Result of the startup device enumeration (possibly empty).
    DevicesFound(Vec<DeviceDescriptor>),
    /// Stream acquisition failed; not retried automatically.
    AcquisitionFailed(AcquisitionError),
}

/// One active camera-to-decode pipeline.
///
/// The session exclusively owns the stream and the retry timer handle, so
/// `stop` has a single place to null them out. The retry handle is only ever
/// set while the stream is held - no retry can outlive teardown.
struct ScanSession {
    seq: u64,
    pending_acquire: Option<AcquireTicket>,
    stream: Option<CameraStream>,
    pending_retry: Option<TimerHandle>,
}

/// The capture-decode state machine.
pub struct ScanLoop<P, S, D> {
    config: ScanConfig,
    controller: StreamController<P>,
    scheduler: S,
    decoder: D,
    sink: Option<FrameSink>,
    session: Option<ScanSession>,
    state: ScanState,
    next_seq: u64,
    events: VecDeque<ScanEvent>,
}

impl<P, S, D> ScanLoop<P, S, D>
where
    P: CameraPlatform,
    S: Scheduler,
    D: Decoder,
{
    pub fn new(config: ScanConfig, platform: P, scheduler: S, mut decoder: D) -> Self {
        let sink = FrameSink::create(config.target_dimensions);
        if sink.is_none() {
            log::warn!(
                "ScanLoop: no drawing surface for {}x{}, scanning disabled",
                config.target_dimensions.width,
                config.target_dimensions.height
            );
        }
        decoder.set_debug(config.debug_logging);
        Self {
            config,
            controller: StreamController::new(platform),
            scheduler,
            decoder,
            sink,
            session: None,
            state: ScanState::Idle,
            next_seq: 0,
            events: VecDeque::new(),
        }
    }

    /// Whether the host has the drawing/decoding surface capability at all.
    /// When false the loop is inert: `start` does nothing and no event is
    /// ever emitted.
    pub fn supported(&self) -> bool {
        self.sink.is_some()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Enumerate devices once and emit `DevicesFound`. Best-effort: an empty
    /// list on enumeration failure, never an error.
    pub fn announce_devices(&mut self) {
        if !self.supported() {
            return;
        }
        let devices = DeviceBroker::list_devices(self.controller.platform_mut());
        self.events.push_back(ScanEvent::DevicesFound(devices));
    }

    /// Begin a session for `selection` (or the platform default).
    ///
    /// Starting while a session exists tears the old one down first, so at
    /// most one live stream is ever held.
    pub fn start(&mut self, selection: Option<DeviceSelection>) {
        if !self.supported() {
            log::warn!("ScanLoop: start ignored, platform unsupported");
            return;
        }
        self.stop_session();

        let seq = self.next_seq;
        self.next_seq += 1;
        let ticket = self.controller.acquire(selection.as_ref());
        self.session = Some(ScanSession {
            seq,
            pending_acquire: Some(ticket),
            stream: None,
            pending_retry: None,
        });
        self.state = ScanState::Acquiring;
        if self.config.debug_logging {
            log::debug!("ScanLoop: session {} acquiring ({:?})", seq, selection);
        }
    }

    /// Tear down the current session: cancel the pending timer, release the
    /// stream, clear session state. Safe from any state; a no-op when there
    /// is nothing to tear down.
    pub fn stop(&mut self) {
        if self.stop_session() {
            self.state = ScanState::Idle;
        }
    }

    /// Deliver acquisition completions and fire due timers. Call from the
    /// owning execution context; everything dispatches inline.
    pub fn pump(&mut self) {
        while let Some((ticket, result)) = self.controller.poll() {
            self.handle_acquisition(ticket, result);
        }
        while let Some(handle) = self.scheduler.poll_due() {
            self.handle_timer(handle);
        }
    }

    /// Pop one pending consumer event.
    pub fn poll_event(&mut self) -> Option<ScanEvent> {
        self.events.pop_front()
    }

    pub fn platform(&self) -> &P {
        self.controller.platform()
    }

    pub fn platform_mut(&mut self) -> &mut P {
        self.controller.platform_mut()
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Returns true when there was a session to tear down.
    fn stop_session(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };
        if let Some(handle) = session.pending_retry.take() {
            self.scheduler.cancel(handle);
        }
        self.controller.release(session.stream.take());
        if self.config.debug_logging {
            log::debug!("ScanLoop: session {} stopped", session.seq);
        }
        true
    }

    fn handle_acquisition(
        &mut self,
        ticket: AcquireTicket,
        result: Result<CameraStream, AcquisitionError>,
    ) {
        let current = self
            .session
            .as_ref()
            .is_some_and(|session| session.pending_acquire == Some(ticket));
        if !current {
            // A stop or a device switch superseded this request. A stream
            // that resolves anyway must be released, never bound.
            if let Ok(stream) = result {
                log::debug!("ScanLoop: releasing stream from superseded acquisition");
                self.controller.release(Some(stream));
            }
            return;
        }

        match result {
            Ok(stream) => {
                // Bind the stream and arm the first capture tick.
                if let Some(session) = self.session.as_mut() {
                    session.pending_acquire = None;
                    session.stream = Some(stream);
                    session.pending_retry =
                        Some(self.scheduler.schedule(self.config.poll_interval));
                    self.state = ScanState::Scanning;
                    log::info!("ScanLoop: session {} scanning", session.seq);
                }
            }
            Err(error) => {
                log::warn!("ScanLoop: acquisition failed: {}", error);
                self.session = None;
                self.state = ScanState::Idle;
                self.events.push_back(ScanEvent::AcquisitionFailed(error));
            }
        }
    }

    fn handle_timer(&mut self, handle: TimerHandle) {
        // Only the session's own pending tick may run; anything else is a
        // timer that survived past teardown.
        let armed = self
            .session
            .as_ref()
            .is_some_and(|session| session.pending_retry == Some(handle));
        if !armed {
            return;
        }

        let capture = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            session.pending_retry = None;
            let Some(stream) = session.stream.as_mut() else {
                return;
            };
            let Some(sink) = self.sink.as_mut() else {
                return;
            };
            match stream.read_frame() {
                Err(cause) => Err(cause),
                Ok(frame) => match sink.draw(&frame) {
                    Err(cause) => Err(cause),
                    Ok(()) => {
                        match self.decoder.decode(sink.pixels(), sink.width(), sink.height()) {
                            DecodeResult::Decoded(text) => Ok(text),
                            DecodeResult::Failed(cause) => Err(cause),
                        }
                    }
                },
            }
        };

        match capture {
            Ok(text) => {
                self.events.push_back(ScanEvent::Decoded(text));
                if self.config.continuous {
                    if let Some(session) = self.session.as_mut() {
                        session.pending_retry =
                            Some(self.scheduler.schedule(self.config.poll_interval));
                    }
                } else {
                    self.stop_session();
                    self.state = ScanState::Stopped;
                }
            }
            Err(cause) => {
                if self.config.debug_logging {
                    log::debug!("ScanLoop: capture attempt failed: {}", cause);
                }
                // Reschedule only while the session still holds its stream.
                // A concurrent stop already cancelled and released; then this
                // arm must not fire.
                if let Some(session) = self.session.as_mut() {
                    if session.stream.is_some() {
                        session.pending_retry =
                            Some(self.scheduler.schedule(self.config.poll_interval));
                    }
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

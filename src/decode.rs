//! Decoder seam.
//!
//! The decoding algorithm itself is a black box behind the `Decoder` trait.
//! Decoders that natively signal success through a bound callback and failure
//! by raising get wrapped so both outcomes come back as one `DecodeResult`
//! value; the scan loop's control flow never depends on callback registration
//! order.

use crate::CaptureFailure;

/// Outcome of one decode attempt. Transient per capture, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeResult {
    Decoded(String),
    Failed(CaptureFailure),
}

/// Optical code decoder.
///
/// Implementations may keep internal state (at minimum a debug flag) but the
/// scan loop never assumes state is carried across ticks.
pub trait Decoder {
    /// Attempt to decode a code from a row-major RGB pixel buffer.
    fn decode(&mut self, pixels: &[u8], width: u32, height: u32) -> DecodeResult;

    /// Toggle the decoder's internal debug output.
    fn set_debug(&mut self, _debug: bool) {}
}

/// Scripted decoder for tests: plays back a fixed sequence of outcomes and
/// counts how many attempts it has seen.
pub struct StubDecoder {
    script: Vec<DecodeResult>,
    next: usize,
    attempts: u64,
    debug: bool,
}

impl StubDecoder {
    /// A decoder that fails every attempt.
    pub fn always_failing() -> Self {
        Self {
            script: Vec::new(),
            next: 0,
            attempts: 0,
            debug: false,
        }
    }

    /// A decoder that plays back `script` in order, then fails forever.
    pub fn scripted(script: Vec<DecodeResult>) -> Self {
        Self {
            script,
            next: 0,
            attempts: 0,
            debug: false,
        }
    }

    /// `failures` failed attempts followed by one success with `text`.
    pub fn failures_then(failures: usize, text: &str) -> Self {
        let mut script = vec![
            DecodeResult::Failed(CaptureFailure::Decode("no code visible".to_string()));
            failures
        ];
        script.push(DecodeResult::Decoded(text.to_string()));
        Self::scripted(script)
    }

    /// Number of decode attempts observed so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl Decoder for StubDecoder {
    fn decode(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> DecodeResult {
        self.attempts += 1;
        let result = match self.script.get(self.next) {
            Some(result) => result.clone(),
            None => DecodeResult::Failed(CaptureFailure::Decode("no code visible".to_string())),
        };
        self.next += 1;
        if self.debug {
            log::debug!("StubDecoder: attempt {} -> {:?}", self.attempts, result);
        }
        result
    }

    fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_decoder_plays_back_in_order() {
        let mut decoder = StubDecoder::failures_then(2, "HELLO");

        assert!(matches!(decoder.decode(&[], 0, 0), DecodeResult::Failed(_)));
        assert!(matches!(decoder.decode(&[], 0, 0), DecodeResult::Failed(_)));
        assert_eq!(
            decoder.decode(&[], 0, 0),
            DecodeResult::Decoded("HELLO".to_string())
        );
        assert_eq!(decoder.attempts(), 3);
    }

    #[test]
    fn exhausted_script_keeps_failing() {
        let mut decoder = StubDecoder::scripted(vec![DecodeResult::Decoded("X".to_string())]);
        assert!(matches!(decoder.decode(&[], 0, 0), DecodeResult::Decoded(_)));
        assert!(matches!(decoder.decode(&[], 0, 0), DecodeResult::Failed(_)));
        assert!(matches!(decoder.decode(&[], 0, 0), DecodeResult::Failed(_)));
    }
}

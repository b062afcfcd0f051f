//! Request/response envelopes exchanged with a decoder worker.

use crate::audio::DecodedAudio;
use crate::error::Result;
use bytes::Bytes;

/// Operation requested of the worker's decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ready,
    Decode,
    DecodeFrame,
    DecodeFrames,
    Reset,
    Free,
}

/// Input moved to the worker with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Bytes),
    Frames(Vec<Bytes>),
}

#[derive(Debug)]
pub struct Request {
    /// Correlation id echoed by the response.
    pub id: u64,
    pub command: Command,
    pub payload: Option<Payload>,
}

/// Successful outcome of a request.
#[derive(Debug)]
pub enum Reply {
    Done,
    Decoded(DecodedAudio),
}

#[derive(Debug)]
pub struct Response {
    pub id: u64,
    pub result: Result<Reply>,
}

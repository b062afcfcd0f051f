//! Worker thread entry point and dispatch loop.

use super::protocol::{Command, Payload, Reply, Request, Response};
use crate::error::{DecoderError, Result};
use crate::instance::StreamDecoder;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, instrument, warn};

/// Run one decoder until it is freed or the proxy goes away.
///
/// Requests are handled strictly in arrival order on a current-thread
/// runtime owned by this thread.
pub(crate) fn run(
    mut decoder: StreamDecoder,
    mut requests: UnboundedReceiver<Request>,
    responses: UnboundedSender<Response>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "decoder worker could not start its runtime");
            while let Some(request) = requests.blocking_recv() {
                let result = Err(DecoderError::WorkerUnavailable(format!(
                    "worker runtime failed to start: {}",
                    err
                )));
                if responses.send(Response { id: request.id, result }).is_err() {
                    break;
                }
            }
            return;
        }
    };

    runtime.block_on(async move {
        // Start loading eagerly; a failure is reported again on `ready`
        if let Err(err) = decoder.ready().await {
            warn!(error = %err, "eager decoder initialization failed");
        }

        while let Some(request) = requests.recv().await {
            let id = request.id;
            let is_free = request.command == Command::Free;
            let result = dispatch(&mut decoder, request).await;

            if responses.send(Response { id, result }).is_err() {
                debug!("worker proxy dropped, stopping");
                break;
            }
            if is_free {
                break;
            }
        }

        decoder.free();
        debug!("decoder worker exiting");
    });
}

#[instrument(skip(decoder, request), fields(id = request.id, command = ?request.command))]
async fn dispatch(decoder: &mut StreamDecoder, request: Request) -> Result<Reply> {
    match (request.command, request.payload) {
        (Command::Ready, _) => decoder.ready().await.map(|_| Reply::Done),
        (Command::Reset, _) => decoder.reset().await.map(|_| Reply::Done),
        (Command::Free, _) => {
            decoder.free();
            Ok(Reply::Done)
        }
        (Command::Decode, Some(Payload::Bytes(data))) => decoder.decode(&data).map(Reply::Decoded),
        (Command::DecodeFrame, Some(Payload::Bytes(frame))) => {
            decoder.decode_frame(&frame).map(Reply::Decoded)
        }
        (Command::DecodeFrames, Some(Payload::Frames(frames))) => {
            decoder.decode_frames(&frames).map(Reply::Decoded)
        }
        (command, payload) => Err(DecoderError::InvalidInput(format!(
            "{:?} request carries {}",
            command,
            match payload {
                None => "no payload",
                Some(Payload::Bytes(_)) => "a byte payload",
                Some(Payload::Frames(_)) => "a frame list payload",
            }
        ))),
    }
}

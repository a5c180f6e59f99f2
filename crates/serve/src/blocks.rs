//! The Blocks request flow: cursor parsing, transform resolution, stream
//! construction and the pump that turns stream events into wire responses.

use crate::{
    error::{status_from_stream_error, status_from_transform_error},
    pb, FirehoseService, Identity, MeterEvent, MeterEventSink, Metrics,
};
use firehose_store::BytesMeter;
use firehose_stream::{EventPayload, StreamError, StreamEvent, StreamRequest};
use firehose_transform::{PassthroughOutput, PassthroughRequest, PassthroughTransform};
use firehose_types::{Cursor, Step};
use prost::Message as _;
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{metadata::MetadataMap, Status};
use tracing::{debug, error, info};

const OUTPUT_CHANNEL_CAPACITY: usize = 16;

type BlocksOutput = ReceiverStream<Result<pb::v2::Response, Status>>;

/// The client's request deadline, from the standard `grpc-timeout` header:
/// up to eight digits followed by a unit character.
pub(crate) fn request_deadline(metadata: &MetadataMap) -> Option<Duration> {
    let raw = metadata.get("grpc-timeout")?.to_str().ok()?;
    if raw.len() < 2 || raw.len() > 9 {
        return None;
    }
    let (value, unit) = raw.split_at(raw.len() - 1);
    let value: u64 = value.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(value * 3600)),
        "M" => Some(Duration::from_secs(value * 60)),
        "S" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_millis(value)),
        "u" => Some(Duration::from_micros(value)),
        "n" => Some(Duration::from_nanos(value)),
        _ => None,
    }
}

pub(crate) async fn start_blocks_stream(
    service: &FirehoseService,
    request: pb::v2::Request,
    identity: Identity,
    deadline: Option<Duration>,
) -> Result<BlocksOutput, Status> {
    let cursor = parse_cursor(&request.cursor)?;

    let outcome = match &service.registry {
        Some(registry) => {
            Some(registry.build(&request.transforms).map_err(status_from_transform_error)?)
        }
        None if !request.transforms.is_empty() => {
            return Err(Status::unimplemented(
                "no transform registry configured within this instance",
            ));
        }
        None => None,
    };

    let (out_tx, out_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    if let Some(passthrough) = outcome.as_ref().and_then(|outcome| outcome.passthrough.clone()) {
        if !passthrough.emits_undos() && !request.final_blocks_only {
            return Err(Status::invalid_argument(
                "this passthrough transform emits no undo steps and requires final_blocks_only",
            ));
        }
        let passthrough_request = PassthroughRequest {
            start_block_num: request.start_block_num,
            stop_block_num: request.stop_block_num,
            cursor,
            final_blocks_only: request.final_blocks_only,
        };
        tokio::spawn(run_passthrough(
            passthrough,
            passthrough_request,
            service.factory.clone(),
            out_tx,
            request.final_blocks_only,
            service.meter_sink.clone(),
            identity,
            deadline,
            cancel,
        ));
        return Ok(ReceiverStream::new(out_rx));
    }

    let meter = BytesMeter::new();
    let stream_request = StreamRequest {
        start_block_num: request.start_block_num,
        stop_block_num: request.stop_block_num,
        cursor,
        final_blocks_only: request.final_blocks_only,
        preprocessor: outcome.as_ref().and_then(|outcome| outcome.preprocessor.clone()),
        index_provider: outcome.as_ref().and_then(|outcome| outcome.index_provider.clone()),
        meter: Some(meter.clone()),
    };
    if let Some(outcome) = &outcome {
        if !outcome.description.is_empty() {
            debug!(target: "firehose_serve", transforms = %outcome.description, "resolved transforms");
        }
    }

    let (stream, events) = service.factory.new_stream(stream_request, cancel.child_token());
    let run = tokio::spawn(stream.run());
    tokio::spawn(pump_events(
        events,
        run,
        out_tx,
        request.final_blocks_only,
        service.meter_sink.clone(),
        identity,
        meter,
        deadline,
        cancel,
    ));
    Ok(ReceiverStream::new(out_rx))
}

pub(crate) fn parse_cursor(opaque: &str) -> Result<Option<Cursor>, Status> {
    if opaque.is_empty() {
        return Ok(None);
    }
    Cursor::from_opaque(opaque)
        .map(Some)
        .map_err(|err| Status::invalid_argument(format!("invalid start cursor {opaque:?}: {err}")))
}

/// Projects a lifecycle step onto the wire, honoring `final_blocks_only`.
/// `None` means the event is not surfaced to this client.
pub(crate) fn project_step(step: Step, final_blocks_only: bool) -> Option<pb::v2::ForkStep> {
    if final_blocks_only {
        return step.is_final().then_some(pb::v2::ForkStep::StepFinal);
    }
    Some(match step {
        Step::New => pb::v2::ForkStep::StepNew,
        Step::Undo => pb::v2::ForkStep::StepUndo,
        Step::Final => pb::v2::ForkStep::StepFinal,
    })
}

fn response_from_event(step: pb::v2::ForkStep, event: StreamEvent) -> pb::v2::Response {
    let cursor = event.cursor.to_opaque();
    let block = match event.payload {
        EventPayload::Block(block) => Some(prost_types::Any {
            type_url: block.payload_type,
            value: block.payload.to_vec(),
        }),
        EventPayload::Processed { output, .. } => Some(output),
        // The undone reference travels in the cursor.
        EventPayload::Tombstone(_) => None,
    };
    pb::v2::Response { block, step: step as i32, cursor }
}

#[allow(clippy::too_many_arguments)]
async fn pump_events(
    mut events: mpsc::Receiver<StreamEvent>,
    run: JoinHandle<Result<(), StreamError>>,
    out_tx: mpsc::Sender<Result<pb::v2::Response, Status>>,
    final_blocks_only: bool,
    sink: Arc<dyn MeterEventSink>,
    identity: Identity,
    meter: BytesMeter,
    deadline: Option<Duration>,
    cancel: CancellationToken,
) {
    metrics::gauge!(Metrics::ACTIVE_REQUESTS).increment(1.0);
    let mut sent: u64 = 0;
    let mut deadline_hit = false;
    let expiry = tokio::time::sleep(deadline.unwrap_or_default());
    tokio::pin!(expiry);

    loop {
        // A client gone while the pipeline idles at the chain tip must
        // still tear the stream down promptly; a lapsed request deadline
        // likewise ends the stream, with its own status.
        let maybe_event = tokio::select! {
            event = events.recv() => event,
            _ = out_tx.closed() => None,
            _ = &mut expiry, if deadline.is_some() => {
                deadline_hit = true;
                None
            }
        };
        let Some(event) = maybe_event else {
            break;
        };
        let Some(step) = project_step(event.step, final_blocks_only) else {
            continue;
        };
        let block_num = event.block_ref().num;
        let response = response_from_event(step, event);
        let bytes = response.encoded_len() as u64;

        sink.emit(MeterEvent::egress("Blocks", bytes, &identity));
        metrics::counter!(Metrics::BLOCKS_SENT_TOTAL).increment(1);
        metrics::counter!(Metrics::BYTES_SENT_TOTAL).increment(bytes);

        if out_tx.send(Ok(response)).await.is_err() {
            debug!(target: "firehose_serve", "client went away, stopping stream");
            break;
        }
        sent += 1;
        if block_num % 200 == 0 {
            info!(target: "firehose_serve", block_num, sent, "stream sent block");
        } else {
            debug!(target: "firehose_serve", block_num, "stream sent block");
        }
    }

    // Tear the pipeline down before collecting its verdict, otherwise a
    // producer blocked on a full channel never observes the shutdown.
    cancel.cancel();
    drop(events);

    let outcome = run.await;
    if deadline_hit {
        debug!(target: "firehose_serve", sent, "request deadline elapsed mid-stream");
        let _ =
            out_tx.send(Err(status_from_stream_error(StreamError::DeadlineExceeded))).await;
    } else {
        match outcome {
            Ok(Ok(())) => {
                info!(
                    target: "firehose_serve",
                    sent,
                    store_bytes = meter.total(),
                    "stream of blocks reached end block"
                );
            }
            Ok(Err(err)) => {
                let _ = out_tx.send(Err(status_from_stream_error(err))).await;
            }
            Err(join_err) => {
                error!(target: "firehose_serve", %join_err, "stream task died");
                let _ =
                    out_tx.send(Err(Status::internal("unexpected stream termination"))).await;
            }
        }
    }
    metrics::gauge!(Metrics::ACTIVE_REQUESTS).decrement(1.0);
}

#[allow(clippy::too_many_arguments)]
async fn run_passthrough(
    passthrough: Arc<dyn PassthroughTransform>,
    request: PassthroughRequest,
    factory: firehose_stream::StreamFactory,
    out_tx: mpsc::Sender<Result<pb::v2::Response, Status>>,
    final_blocks_only: bool,
    sink: Arc<dyn MeterEventSink>,
    identity: Identity,
    deadline: Option<Duration>,
    cancel: CancellationToken,
) {
    metrics::gauge!(Metrics::ACTIVE_PASSTHROUGHS).increment(1.0);
    metrics::counter!(Metrics::PASSTHROUGHS_TOTAL).increment(1);

    let (pt_tx, mut pt_rx) = mpsc::channel::<PassthroughOutput>(OUTPUT_CHANNEL_CAPACITY);
    let runner = {
        let cancel = cancel.child_token();
        tokio::spawn(async move { passthrough.run(request, factory, pt_tx, cancel).await })
    };

    let mut deadline_hit = false;
    let expiry = tokio::time::sleep(deadline.unwrap_or_default());
    tokio::pin!(expiry);

    loop {
        let maybe_output = tokio::select! {
            output = pt_rx.recv() => output,
            _ = out_tx.closed() => None,
            _ = &mut expiry, if deadline.is_some() => {
                deadline_hit = true;
                None
            }
        };
        let Some(output) = maybe_output else {
            break;
        };
        let (step, cursor) = match &output.cursor {
            Some(cursor) => match project_step(cursor.step, final_blocks_only) {
                Some(step) => (step, cursor.to_opaque()),
                None => continue,
            },
            None => (pb::v2::ForkStep::StepUnset, String::new()),
        };
        let response =
            pb::v2::Response { block: Some(output.payload), step: step as i32, cursor };
        let bytes = response.encoded_len() as u64;
        sink.emit(MeterEvent::egress("Blocks", bytes, &identity));
        metrics::counter!(Metrics::BLOCKS_SENT_TOTAL).increment(1);
        metrics::counter!(Metrics::BYTES_SENT_TOTAL).increment(bytes);

        if out_tx.send(Ok(response)).await.is_err() {
            debug!(target: "firehose_serve", "client went away, stopping passthrough");
            break;
        }
    }

    cancel.cancel();
    drop(pt_rx);

    let outcome = runner.await;
    if deadline_hit {
        debug!(target: "firehose_serve", "request deadline elapsed mid-passthrough");
        let _ =
            out_tx.send(Err(status_from_stream_error(StreamError::DeadlineExceeded))).await;
    } else {
        match outcome {
            Ok(Ok(())) => {
                info!(target: "firehose_serve", "passthrough completed");
            }
            Ok(Err(err)) => {
                let _ = out_tx.send(Err(status_from_transform_error(err))).await;
            }
            Err(join_err) => {
                error!(target: "firehose_serve", %join_err, "passthrough task died");
                let _ =
                    out_tx.send(Err(Status::internal("unexpected stream termination"))).await;
            }
        }
    }
    metrics::gauge!(Metrics::ACTIVE_PASSTHROUGHS).decrement(1.0);
}

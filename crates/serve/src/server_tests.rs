//! Request-level tests against the service implementation, driven through
//! the generated service traits without a network in between.

use crate::{
    pb,
    pb::v2::{fetch_server::Fetch as _, stream_server::Stream as _},
    AuthError, Authenticator, FirehoseService, Identity, LeakyBucketLimiter, LegacyBlocksProxy,
};
use async_trait::async_trait;
use firehose_store::{BlobStore, MemoryBlobStore};
use firehose_stream::{
    testing::{seed_merged_bundles, test_block, TestCodec, TEST_PAYLOAD_TYPE},
    BlockGetter, ForkableHub, StreamConfig, StreamFactory,
};
use firehose_types::{Block, Cursor};
use std::{sync::Arc, time::Duration};
use tokio_stream::StreamExt as _;
use tonic::{Code, Request};

fn chain(from: u64, to: u64) -> Vec<Block> {
    (from..=to)
        .map(|num| {
            test_block(
                num,
                &format!("{num}a"),
                &format!("{}a", num - 1),
                num - 1,
                &format!("{}a", num - 1),
            )
        })
        .collect()
}

fn service_over(blocks: &[Block]) -> FirehoseService {
    let store = MemoryBlobStore::new();
    seed_merged_bundles(&store, blocks);
    let merged: Arc<dyn BlobStore> = Arc::new(store);
    let hub: Option<Arc<dyn ForkableHub>> = None;
    let factory = StreamFactory::new(
        merged.clone(),
        Vec::new(),
        hub.clone(),
        Arc::new(TestCodec),
        StreamConfig::default(),
    );
    let getter = BlockGetter::new(hub, merged, None, Arc::new(TestCodec));
    FirehoseService::new(factory, getter)
}

fn blocks_request(start: i64, stop: u64) -> pb::v2::Request {
    pb::v2::Request {
        start_block_num: start,
        cursor: String::new(),
        stop_block_num: stop,
        final_blocks_only: false,
        transforms: Vec::new(),
    }
}

async fn collect(
    response: tonic::Response<<FirehoseService as pb::v2::stream_server::Stream>::BlocksStream>,
) -> Vec<pb::v2::Response> {
    let mut stream = response.into_inner();
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item.expect("stream item"));
    }
    items
}

#[tokio::test]
async fn blocks_streams_a_bounded_range() {
    let service = service_over(&chain(2, 5));
    let response =
        service.blocks(Request::new(blocks_request(2, 4))).await.expect("stream opens");
    let items = collect(response).await;

    let steps: Vec<i32> = items.iter().map(|item| item.step).collect();
    let new = pb::v2::ForkStep::StepNew as i32;
    let fin = pb::v2::ForkStep::StepFinal as i32;
    assert_eq!(steps, vec![new, new, fin, new, fin]);

    for item in &items {
        let block = item.block.as_ref().expect("block payload");
        assert_eq!(block.type_url, TEST_PAYLOAD_TYPE);
        assert!(!item.cursor.is_empty());
        Cursor::from_opaque(&item.cursor).expect("emitted cursors decode");
    }
}

#[tokio::test]
async fn final_blocks_only_projects_only_final_steps() {
    let service = service_over(&chain(2, 5));
    let request = pb::v2::Request { final_blocks_only: true, ..blocks_request(2, 4) };
    let response = service.blocks(Request::new(request)).await.expect("stream opens");
    let items = collect(response).await;

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item.step == pb::v2::ForkStep::StepFinal as i32));
}

#[tokio::test]
async fn invalid_cursor_is_rejected_up_front() {
    let service = service_over(&chain(2, 5));
    let request = pb::v2::Request { cursor: "garbage".to_string(), ..blocks_request(2, 4) };
    let status = service.blocks(Request::new(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("invalid start cursor"));
}

#[tokio::test]
async fn transforms_without_a_registry_are_unimplemented() {
    let service = service_over(&chain(2, 5));
    let request = pb::v2::Request {
        transforms: vec![prost_types::Any {
            type_url: "type.test/whatever".to_string(),
            value: Vec::new(),
        }],
        ..blocks_request(2, 4)
    };
    let status = service.blocks(Request::new(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);
}

#[tokio::test]
async fn rejected_credentials_map_to_auth_codes() {
    struct RejectAll;

    #[async_trait]
    impl Authenticator for RejectAll {
        async fn check(
            &self,
            _metadata: &tonic::metadata::MetadataMap,
        ) -> Result<Identity, AuthError> {
            Err(AuthError::Unauthenticated)
        }
    }

    let service = service_over(&chain(2, 5)).with_authenticator(Arc::new(RejectAll));
    let status = service.blocks(Request::new(blocks_request(2, 4))).await.unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn rate_limit_applies_per_stream_open() {
    let service = service_over(&chain(2, 5)).with_rate_limiter(Arc::new(
        LeakyBucketLimiter::new(1, Duration::from_secs(3600)),
    ));

    let first = service.blocks(Request::new(blocks_request(2, 4))).await;
    assert!(first.is_ok());

    let status = service.blocks(Request::new(blocks_request(2, 4))).await.unwrap_err();
    assert_eq!(status.code(), Code::ResourceExhausted);
}

#[tokio::test]
async fn lapsed_deadline_surfaces_deadline_exceeded() {
    let service = service_over(&chain(2, 5));

    // Open-ended request: after draining the archive the stream waits at
    // the tip, so only the deadline can end it.
    let mut request = Request::new(blocks_request(2, 0));
    request.metadata_mut().insert("grpc-timeout", "100m".parse().unwrap());

    let response = service.blocks(request).await.expect("stream opens");
    let mut stream = response.into_inner();
    let mut terminal = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(_) => {}
            Err(status) => terminal = Some(status),
        }
    }

    let status = terminal.expect("terminal status after the deadline");
    assert_eq!(status.code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn hostname_header_is_attached_when_enabled() {
    let service = service_over(&chain(2, 5)).with_send_hostname(true);
    let response = service.blocks(Request::new(blocks_request(2, 4))).await.expect("stream");
    assert!(response.metadata().get("hostname").is_some());
}

#[tokio::test]
async fn single_block_lookup_resolves_references() {
    let service = service_over(&chain(2, 5));

    // By number only.
    let request = pb::v2::SingleBlockRequest {
        transforms: Vec::new(),
        reference: Some(pb::v2::single_block_request::Reference::BlockNumber(
            pb::v2::single_block_request::BlockNumber { num: 3 },
        )),
    };
    let response = service.block(Request::new(request)).await.expect("found");
    assert_eq!(response.into_inner().block.expect("payload").type_url, TEST_PAYLOAD_TYPE);

    // By number and hash.
    let request = pb::v2::SingleBlockRequest {
        transforms: Vec::new(),
        reference: Some(pb::v2::single_block_request::Reference::BlockHashAndNumber(
            pb::v2::single_block_request::BlockHashAndNumber { num: 3, hash: "3a".to_string() },
        )),
    };
    assert!(service.block(Request::new(request)).await.is_ok());

    // Missing block.
    let request = pb::v2::SingleBlockRequest {
        transforms: Vec::new(),
        reference: Some(pb::v2::single_block_request::Reference::BlockNumber(
            pb::v2::single_block_request::BlockNumber { num: 9999 },
        )),
    };
    let status = service.block(Request::new(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    // Garbage cursor reference.
    let request = pb::v2::SingleBlockRequest {
        transforms: Vec::new(),
        reference: Some(pb::v2::single_block_request::Reference::Cursor(
            pb::v2::single_block_request::Cursor { cursor: "garbage".to_string() },
        )),
    };
    let status = service.block(Request::new(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    // No reference at all.
    let request = pb::v2::SingleBlockRequest { transforms: Vec::new(), reference: None };
    let status = service.block(Request::new(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

/// A passthrough that spawns one child stream and echoes each event's block
/// number, proving it receives the server's stream constructor and the
/// client sender.
struct EchoPassthrough;

#[async_trait]
impl firehose_transform::PassthroughTransform for EchoPassthrough {
    fn emits_undos(&self) -> bool {
        false
    }

    async fn run(
        &self,
        request: firehose_transform::PassthroughRequest,
        factory: StreamFactory,
        output: tokio::sync::mpsc::Sender<firehose_transform::PassthroughOutput>,
        cancel: tokio_util::sync::CancellationToken,
    ) -> Result<(), firehose_transform::TransformError> {
        let stream_request = firehose_stream::StreamRequest {
            start_block_num: request.start_block_num,
            stop_block_num: request.stop_block_num,
            cursor: request.cursor.clone(),
            final_blocks_only: request.final_blocks_only,
            ..Default::default()
        };
        let (stream, mut events) = factory.new_stream(stream_request, cancel.child_token());
        let run = tokio::spawn(stream.run());
        while let Some(event) = events.recv().await {
            let payload = prost_types::Any {
                type_url: "type.test/echo".to_string(),
                value: event.block_ref().num.to_be_bytes().to_vec(),
            };
            let out = firehose_transform::PassthroughOutput {
                cursor: Some(event.cursor.clone()),
                payload,
            };
            if output.send(out).await.is_err() {
                break;
            }
        }
        run.await.map_err(|_| {
            firehose_transform::TransformError::Stream(firehose_stream::StreamError::Internal(
                "child stream died".to_string(),
            ))
        })??;
        Ok(())
    }
}

struct EchoPassthroughFactory;

impl firehose_transform::TransformFactory for EchoPassthroughFactory {
    fn new_transform(
        &self,
        _descriptor: &prost_types::Any,
    ) -> Result<firehose_transform::Transform, firehose_transform::TransformError> {
        Ok(firehose_transform::Transform::Passthrough(Arc::new(EchoPassthrough)))
    }
}

fn echo_registry() -> Arc<firehose_transform::TransformRegistry> {
    let mut registry = firehose_transform::TransformRegistry::new();
    registry.register("type.test/echo", EchoPassthroughFactory);
    Arc::new(registry)
}

#[tokio::test]
async fn passthrough_takes_over_the_emission_loop() {
    let service = service_over(&chain(2, 5)).with_transform_registry(echo_registry());
    let request = pb::v2::Request {
        final_blocks_only: true,
        transforms: vec![prost_types::Any {
            type_url: "type.test/echo".to_string(),
            value: Vec::new(),
        }],
        ..blocks_request(2, 4)
    };
    let response = service.blocks(Request::new(request)).await.expect("stream opens");
    let items = collect(response).await;

    assert_eq!(items.len(), 3);
    for (item, expected) in items.iter().zip(2u64..) {
        assert_eq!(item.step, pb::v2::ForkStep::StepFinal as i32);
        let block = item.block.as_ref().expect("echo payload");
        assert_eq!(block.type_url, "type.test/echo");
        assert_eq!(block.value, expected.to_be_bytes().to_vec());
        assert!(!item.cursor.is_empty());
    }
}

#[tokio::test]
async fn undo_blind_passthrough_requires_final_blocks_only() {
    let service = service_over(&chain(2, 5)).with_transform_registry(echo_registry());
    let request = pb::v2::Request {
        final_blocks_only: false,
        transforms: vec![prost_types::Any {
            type_url: "type.test/echo".to_string(),
            value: Vec::new(),
        }],
        ..blocks_request(2, 4)
    };
    let status = service.blocks(Request::new(request)).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn legacy_proxy_translates_requests_and_steps() {
    use crate::pb::v1::stream_server::Stream as _;

    let proxy = LegacyBlocksProxy::new(Arc::new(service_over(&chain(2, 5))));
    let request = pb::v1::Request {
        start_block_num: 2,
        start_cursor: String::new(),
        stop_block_num: 4,
        fork_steps: vec![pb::v1::ForkStep::StepIrreversible as i32],
        transforms: Vec::new(),
    };
    let response = proxy.blocks(Request::new(request)).await.expect("stream opens");
    let mut stream = response.into_inner();
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item.expect("stream item"));
    }

    assert_eq!(items.len(), 3);
    assert!(items
        .iter()
        .all(|item| item.step == pb::v1::ForkStep::StepIrreversible as i32));
}

#[tokio::test]
async fn resuming_with_an_emitted_cursor_continues_the_stream() {
    let service = service_over(&chain(2, 8));

    let response =
        service.blocks(Request::new(blocks_request(2, 7))).await.expect("stream opens");
    let full = collect(response).await;
    assert!(full.len() > 3);

    let cut = &full[2];
    let request = pb::v2::Request { cursor: cut.cursor.clone(), ..blocks_request(0, 7) };
    let response = service.blocks(Request::new(request)).await.expect("resume opens");
    let resumed = collect(response).await;

    let suffix: Vec<(i32, String)> =
        full[3..].iter().map(|item| (item.step, item.cursor.clone())).collect();
    let resumed: Vec<(i32, String)> =
        resumed.iter().map(|item| (item.step, item.cursor.clone())).collect();
    assert_eq!(resumed, suffix);
}

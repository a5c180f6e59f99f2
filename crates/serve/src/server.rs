//! The firehose gRPC service.

use crate::{
    blocks,
    error::status_from_stream_error,
    pb, Authenticator, Identity, LegacyBlocksProxy, MeterEvent, MeterEventSink, Metrics,
    NoopAuthenticator, RateLimiter, TracingMeterSink, TransportSecurity,
};
use firehose_stream::{BlockGetter, StreamFactory};
use firehose_store::BytesMeter;
use firehose_types::Cursor;
use firehose_transform::TransformRegistry;
use prost::Message as _;
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, Request, Response, Status};
use tracing::{info, warn};

/// The Blocks/Block service implementation, shared by the v2 surface and
/// the legacy v1 proxy.
pub struct FirehoseService {
    pub(crate) factory: StreamFactory,
    pub(crate) getter: Arc<BlockGetter>,
    pub(crate) registry: Option<Arc<TransformRegistry>>,
    pub(crate) authenticator: Arc<dyn Authenticator>,
    pub(crate) limiter: Option<Arc<dyn RateLimiter>>,
    pub(crate) meter_sink: Arc<dyn MeterEventSink>,
    pub(crate) send_hostname: bool,
}

impl std::fmt::Debug for FirehoseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirehoseService")
            .field("registry", &self.registry.is_some())
            .field("limiter", &self.limiter.is_some())
            .field("send_hostname", &self.send_hostname)
            .finish_non_exhaustive()
    }
}

impl FirehoseService {
    /// Creates a service over a stream factory and a single-block getter,
    /// with an accept-all authenticator and log-based metering.
    pub fn new(factory: StreamFactory, getter: BlockGetter) -> Self {
        Self {
            factory,
            getter: Arc::new(getter),
            registry: None,
            authenticator: Arc::new(NoopAuthenticator),
            limiter: None,
            meter_sink: Arc::new(TracingMeterSink),
            send_hostname: false,
        }
    }

    /// Installs the transform registry.
    pub fn with_transform_registry(mut self, registry: Arc<TransformRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Installs the authorizer.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Installs the stream-open rate limiter.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Replaces the meter event sink.
    pub fn with_meter_sink(mut self, sink: Arc<dyn MeterEventSink>) -> Self {
        self.meter_sink = sink;
        self
    }

    /// Sends the server hostname as initial metadata on block streams.
    pub const fn with_send_hostname(mut self, send: bool) -> Self {
        self.send_hostname = send;
        self
    }

    pub(crate) async fn authorize(&self, metadata: &tonic::metadata::MetadataMap) -> Result<Identity, Status> {
        Ok(self.authenticator.check(metadata).await?)
    }
}

#[tonic::async_trait]
impl pb::v2::stream_server::Stream for FirehoseService {
    type BlocksStream = ReceiverStream<Result<pb::v2::Response, Status>>;

    async fn blocks(
        &self,
        request: Request<pb::v2::Request>,
    ) -> Result<Response<Self::BlocksStream>, Status> {
        metrics::counter!(Metrics::REQUESTS_TOTAL).increment(1);

        let identity = self.authorize(request.metadata()).await?;
        if let Some(limiter) = &self.limiter {
            if !limiter.allow(&identity) {
                return Err(Status::resource_exhausted("too many streams open, retry later"));
            }
        }

        let deadline = blocks::request_deadline(request.metadata());
        let req = request.into_inner();
        info!(
            target: "firehose_serve",
            start_block_num = req.start_block_num,
            stop_block_num = req.stop_block_num,
            cursor = !req.cursor.is_empty(),
            final_blocks_only = req.final_blocks_only,
            transforms = req.transforms.len(),
            deadline = ?deadline,
            "incoming blocks request"
        );

        let stream = blocks::start_blocks_stream(self, req, identity, deadline).await?;

        let mut response = Response::new(stream);
        if self.send_hostname {
            let name = hostname::get()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| {
                    warn!(target: "firehose_serve", "cannot determine hostname, using 'unknown'");
                    "unknown".to_string()
                });
            if let Ok(value) = name.parse() {
                response.metadata_mut().insert("hostname", value);
            }
        }
        Ok(response)
    }
}

#[tonic::async_trait]
impl pb::v2::fetch_server::Fetch for FirehoseService {
    async fn block(
        &self,
        request: Request<pb::v2::SingleBlockRequest>,
    ) -> Result<Response<pb::v2::SingleBlockResponse>, Status> {
        let identity = self.authorize(request.metadata()).await?;
        let req = request.into_inner();

        use pb::v2::single_block_request::Reference;
        let (num, id) = match req.reference {
            Some(Reference::BlockNumber(reference)) => (reference.num, String::new()),
            Some(Reference::BlockHashAndNumber(reference)) => (reference.num, reference.hash),
            Some(Reference::Cursor(reference)) => {
                let cursor = Cursor::from_opaque(&reference.cursor).map_err(|err| {
                    Status::invalid_argument(format!("invalid cursor: {err}"))
                })?;
                (cursor.block.num, cursor.block.id)
            }
            None => return Err(Status::invalid_argument("missing block reference")),
        };

        let meter = BytesMeter::new();
        let block = self
            .getter
            .get(num, &id, Some(&meter))
            .await
            .map_err(status_from_stream_error)?
            .ok_or_else(|| Status::not_found(format!("block #{num} ({id}) not found")))?;

        let response = pb::v2::SingleBlockResponse {
            block: Some(prost_types::Any {
                type_url: block.payload_type,
                value: block.payload.to_vec(),
            }),
        };
        self.meter_sink.emit(MeterEvent::egress(
            "Block",
            response.encoded_len() as u64,
            &identity,
        ));
        Ok(Response::new(response))
    }
}

/// Errors binding or running the listener.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The transport failed to configure or serve.
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
}

/// Binds `addr` and serves the v2 Stream/Fetch services plus the legacy v1
/// proxy until `cancel` fires. Gzip compression is accepted and offered on
/// the streaming surface.
pub async fn serve(
    addr: SocketAddr,
    service: FirehoseService,
    security: TransportSecurity,
    cancel: CancellationToken,
) -> Result<(), ServeError> {
    let service = Arc::new(service);
    let legacy = LegacyBlocksProxy::new(service.clone());

    let mut builder = tonic::transport::Server::builder();
    if let TransportSecurity::Tls { cert_pem, key_pem } = &security {
        let identity = tonic::transport::Identity::from_pem(cert_pem, key_pem);
        builder =
            builder.tls_config(tonic::transport::ServerTlsConfig::new().identity(identity))?;
    }

    info!(
        target: "firehose_serve",
        %addr,
        tls = matches!(security, TransportSecurity::Tls { .. }),
        "serving firehose"
    );
    builder
        .add_service(
            pb::v2::stream_server::StreamServer::from_arc(service.clone())
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        )
        .add_service(pb::v2::fetch_server::FetchServer::from_arc(service.clone()))
        .add_service(pb::v1::stream_server::StreamServer::new(legacy))
        .serve_with_shutdown(addr, cancel.cancelled_owned())
        .await?;
    Ok(())
}

//! Firehose service binary.
//!
//! Serves fork-aware block streams out of merged-block archives. Chain
//! integrations embedding a live hub and their own transforms build on the
//! library crates instead; this binary wires the archive-only deployment.

mod flags;
mod telemetry;

use anyhow::{bail, Context, Result};
use clap::Parser as _;
use firehose_serve::{
    serve, BearerTokenAuthenticator, FirehoseService, LeakyBucketLimiter, Metrics,
    TransportSecurity,
};
use firehose_store::{BlobStore, EnvelopeCodec, FsBlobStore, MemoryBlobStore};
use firehose_stream::{BlockGetter, StreamConfig, StreamFactory};
use flags::FirehoseArgs;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    let args = FirehoseArgs::parse();
    telemetry::init()?;

    Metrics::init();
    if let Some(addr) = args.metrics_listen_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("starting prometheus exporter")?;
        info!(target: "firehose", %addr, "prometheus exporter listening");
    }

    let mut stores = args.merged_blocks_stores.iter().map(|url| store_from_url(url));
    let primary = stores.next().expect("clap enforces at least one store")?;
    let secondaries = stores.collect::<Result<Vec<_>>>()?;
    let forked = args.forked_blocks_store.as_deref().map(store_from_url).transpose()?;

    let decoder = Arc::new(EnvelopeCodec);
    let config = StreamConfig { preproc_threads: args.preproc_threads, ..Default::default() };
    // Live hub wiring is the embedding chain integration's job; the
    // standalone binary serves the archived tiers.
    let factory = StreamFactory::new(primary.clone(), secondaries, None, decoder.clone(), config);
    let getter = BlockGetter::new(None, primary, forked, decoder);

    // No transform registry here: transforms are chain-specific, and a
    // request carrying any on this build is answered with UNIMPLEMENTED.
    let send_hostname =
        std::env::var("SEND_HOSTNAME").map(|value| !value.is_empty()).unwrap_or(false);
    let mut service = FirehoseService::new(factory, getter).with_send_hostname(send_hostname);
    if !args.auth_tokens.is_empty() {
        service = service
            .with_authenticator(Arc::new(BearerTokenAuthenticator::new(args.auth_tokens.clone())));
    }
    if args.rate_limit_size > 0 {
        service = service.with_rate_limiter(Arc::new(LeakyBucketLimiter::new(
            args.rate_limit_size,
            Duration::from_millis(args.rate_limit_drip_ms),
        )));
    }

    let security = TransportSecurity::from_flags(
        args.plaintext,
        args.insecure_skip_verify,
        args.tls_cert
            .as_ref()
            .map(std::fs::read)
            .transpose()
            .context("reading tls certificate")?,
        args.tls_key.as_ref().map(std::fs::read).transpose().context("reading tls key")?,
    )?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "firehose", "shutdown requested");
            shutdown.cancel();
        }
    });

    serve(args.grpc_listen_addr, service, security, cancel).await?;
    info!(target: "firehose", "server stopped");
    Ok(())
}

fn store_from_url(spec: &str) -> Result<Arc<dyn BlobStore>> {
    let url = Url::parse(spec).with_context(|| format!("invalid store url {spec:?}"))?;
    match url.scheme() {
        "memory" => Ok(Arc::new(MemoryBlobStore::new())),
        "file" => Ok(Arc::new(FsBlobStore::new(url.path()))),
        other => bail!("unsupported store scheme {other:?}, expected file:// or memory://"),
    }
}

//! Tracing bootstrap.
//!
//! `DTRACING` selects the span exporter by URL scheme; absent means plain
//! filtered log output. Unsupported schemes fail startup loudly instead of
//! silently dropping spans.

use anyhow::{anyhow, bail, Result};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};
use url::Url;

pub(crate) fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let dtracing = std::env::var("DTRACING").ok().filter(|spec| !spec.is_empty());
    match dtracing {
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
        Some(spec) => {
            let url = Url::parse(&spec)
                .map_err(|err| anyhow!("invalid DTRACING url {spec:?}: {err}"))?;
            match url.scheme() {
                "stdout" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(
                            tracing_subscriber::fmt::layer()
                                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
                        )
                        .init();
                }
                scheme @ ("cloudtrace" | "otelcol" | "zipkin" | "jaeger") => {
                    bail!("DTRACING exporter {scheme:?} is not compiled into this build");
                }
                other => bail!("unknown DTRACING exporter scheme {other:?}"),
            }
        }
    }
    Ok(())
}

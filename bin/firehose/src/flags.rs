//! Command line flags.

use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};

/// Fork-aware block streaming service over merged-block archives.
#[derive(Debug, Parser)]
#[command(name = "firehose", version, about)]
pub struct FirehoseArgs {
    /// Address the gRPC services listen on.
    #[arg(long = "grpc-listen-addr", default_value = "0.0.0.0:10015")]
    pub grpc_listen_addr: SocketAddr,

    /// Merged-blocks store URLs (`file://` or `memory://`). The first is
    /// the primary; the rest are consulted only when the primary lacks a
    /// bundle.
    #[arg(long = "merged-blocks-store", required = true, num_args = 1..)]
    pub merged_blocks_stores: Vec<String>,

    /// One-block (forked blocks) store URL for non-final sibling lookups.
    #[arg(long = "forked-blocks-store")]
    pub forked_blocks_store: Option<String>,

    /// Bundles decoded and preprocessed concurrently per stream.
    #[arg(long = "preproc-threads", default_value_t = 16)]
    pub preproc_threads: usize,

    /// Leaky-bucket capacity for stream opens; 0 disables rate limiting.
    #[arg(long = "rate-limit-size", default_value_t = 0)]
    pub rate_limit_size: u32,

    /// Leaky-bucket drain interval in milliseconds.
    #[arg(long = "rate-limit-drip-ms", default_value_t = 1_000)]
    pub rate_limit_drip_ms: u64,

    /// Serve without TLS.
    #[arg(long)]
    pub plaintext: bool,

    /// Accept TLS without certificate verification (testing only).
    #[arg(long = "insecure-skip-verify")]
    pub insecure_skip_verify: bool,

    /// PEM certificate chain for TLS.
    #[arg(long = "tls-cert", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for TLS.
    #[arg(long = "tls-key", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Prometheus exporter listen address; unset disables metrics export.
    #[arg(long = "metrics-listen-addr")]
    pub metrics_listen_addr: Option<SocketAddr>,

    /// Accepted bearer tokens; empty means open access.
    #[arg(long = "auth-token")]
    pub auth_tokens: Vec<String>,
}

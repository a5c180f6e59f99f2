//! The firehose RPC surface.
//!
//! Exposes the `Blocks` server-streaming and `Block` unary services over
//! tonic, orchestrating authorization, rate limiting, cursor parsing,
//! transform resolution, stream construction, response serialization,
//! metering and error translation. A legacy prior-version proxy is served
//! alongside.

pub mod pb;

mod auth;
pub use auth::{AuthError, Authenticator, BearerTokenAuthenticator, Identity, NoopAuthenticator};

mod limiter;
pub use limiter::{LeakyBucketLimiter, RateLimiter};

mod metering;
pub use metering::{MeterEvent, MeterEventSink, TracingMeterSink};

mod metrics;
pub use metrics::Metrics;

mod tls;
pub use tls::{TransportError, TransportSecurity};

mod error;

mod blocks;

mod server;
pub use server::{serve, FirehoseService, ServeError};

mod legacy;
pub use legacy::LegacyBlocksProxy;

#[cfg(test)]
mod server_tests;

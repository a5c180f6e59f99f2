//! Terminal error translation to wire status codes.
//!
//! Client-attributable conditions keep their messages; anything internal is
//! logged with the original error and reported as a generic INTERNAL.

use firehose_stream::StreamError;
use firehose_transform::TransformError;
use tonic::Status;
use tracing::{debug, error};

pub(crate) fn status_from_stream_error(err: StreamError) -> Status {
    match err {
        StreamError::InvalidArgument(message) => Status::invalid_argument(message),
        StreamError::InvalidCursor(err) => {
            Status::invalid_argument(format!("invalid start cursor: {err}"))
        }
        StreamError::NotFound(message) => Status::not_found(message),
        StreamError::SubscriptionLagging => {
            Status::unavailable("stream fell behind the live source, resume with the last cursor")
        }
        StreamError::LiveSourceClosed => Status::unavailable("live source went away, retry"),
        StreamError::Cancelled => Status::cancelled("source canceled"),
        StreamError::DeadlineExceeded => Status::deadline_exceeded("source deadline exceeded"),
        StreamError::ConsumerGone => {
            // The client went away mid-send; only interesting at debug level.
            debug!(target: "firehose_serve", "client disconnected mid-stream");
            Status::unavailable("client disconnected")
        }
        err @ (StreamError::Store(_)
        | StreamError::BundleHole { .. }
        | StreamError::Preprocess(_)
        | StreamError::Internal(_)) => {
            error!(target: "firehose_serve", %err, "unexpected stream termination");
            Status::internal("unexpected stream termination")
        }
    }
}

pub(crate) fn status_from_transform_error(err: TransformError) -> Status {
    match err {
        TransformError::Stream(err) => status_from_stream_error(err),
        err @ (TransformError::UnknownDescriptor { .. }
        | TransformError::InvalidDescriptor { .. }
        | TransformError::MultiplePassthroughs) => Status::invalid_argument(err.to_string()),
    }
}

//! Legacy `sf.firehose.v1` proxy.
//!
//! Translates the prior-version request schema onto the current one and
//! re-projects outgoing steps into the v1 enum layout. Purely additive: no
//! behavior beyond translation.

use crate::{pb, FirehoseService};
use futures::StreamExt as _;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// The v1 Stream service, backed by the v2 implementation.
#[derive(Debug, Clone)]
pub struct LegacyBlocksProxy {
    inner: Arc<FirehoseService>,
}

impl LegacyBlocksProxy {
    /// Wraps the current-version service.
    pub fn new(inner: Arc<FirehoseService>) -> Self {
        Self { inner }
    }
}

#[tonic::async_trait]
impl pb::v1::stream_server::Stream for LegacyBlocksProxy {
    type BlocksStream = futures::stream::BoxStream<'static, Result<pb::v1::Response, Status>>;

    async fn blocks(
        &self,
        request: Request<pb::v1::Request>,
    ) -> Result<Response<Self::BlocksStream>, Status> {
        let metadata = request.metadata().clone();
        let legacy = request.into_inner();

        let translated = pb::v2::Request {
            start_block_num: legacy.start_block_num,
            cursor: legacy.start_cursor,
            stop_block_num: legacy.stop_block_num,
            final_blocks_only: is_final_only(&legacy.fork_steps),
            transforms: legacy.transforms,
        };
        let mut inner_request = Request::new(translated);
        *inner_request.metadata_mut() = metadata;

        let response =
            <FirehoseService as pb::v2::stream_server::Stream>::blocks(&self.inner, inner_request)
                .await?;
        let (metadata, stream, extensions) = response.into_parts();
        let mapped = stream.map(|item| item.map(project_to_v1)).boxed();
        Ok(Response::from_parts(metadata, mapped, extensions))
    }
}

/// The v1 schema expressed "final only" as a fork-step filter.
fn is_final_only(fork_steps: &[i32]) -> bool {
    !fork_steps.is_empty()
        && fork_steps.iter().all(|step| *step == pb::v1::ForkStep::StepIrreversible as i32)
}

fn project_to_v1(response: pb::v2::Response) -> pb::v1::Response {
    let step = match pb::v2::ForkStep::try_from(response.step) {
        Ok(pb::v2::ForkStep::StepNew) => pb::v1::ForkStep::StepNew,
        Ok(pb::v2::ForkStep::StepUndo) => pb::v1::ForkStep::StepUndo,
        Ok(pb::v2::ForkStep::StepFinal) => pb::v1::ForkStep::StepIrreversible,
        _ => pb::v1::ForkStep::StepUnknown,
    };
    pb::v1::Response { block: response.block, step: step as i32, cursor: response.cursor }
}

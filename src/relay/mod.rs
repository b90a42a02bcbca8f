//! Chat relay: one upstream call per client request, either aggregated into a
//! single answer or re-framed as a live event stream.

mod decoder;
mod events;
mod translator;

pub use events::ClientEvent;
pub use translator::to_sse_frame;

use decoder::decode_events;
use translator::translate;

use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::{RelayConfig, RelaySettings};
use crate::error::RelayError;
use crate::upstream::{
    ByteStream, UpstreamClient, UpstreamError, UpstreamMode, UpstreamPayload, UpstreamResponse,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Building,
    AwaitingUpstream,
    Relaying,
    Terminated,
}

/// Phase tracking for one request. Dropping it before `Terminated` means the
/// request was cancelled.
struct Lifecycle {
    request_id: Uuid,
    phase: RelayPhase,
}

impl Lifecycle {
    fn start(request_id: Uuid) -> Self {
        debug!("[{}] {:?}", request_id, RelayPhase::Building);
        Self {
            request_id,
            phase: RelayPhase::Building,
        }
    }

    fn advance(&mut self, next: RelayPhase) {
        if self.phase == RelayPhase::Terminated {
            return;
        }
        debug!("[{}] {:?} -> {:?}", self.request_id, self.phase, next);
        self.phase = next;
    }

    fn finish(&mut self, outcome: &str) {
        if self.phase == RelayPhase::Terminated {
            return;
        }
        debug!("[{}] {:?} -> Terminated ({})", self.request_id, self.phase, outcome);
        self.phase = RelayPhase::Terminated;
    }

    fn fail(&mut self, error: &RelayError) {
        warn!("[{}] relay failed during {:?}: {}", self.request_id, self.phase, error);
        self.finish("error");
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if self.phase != RelayPhase::Terminated {
            info!("[{}] relay cancelled during {:?}", self.request_id, self.phase);
        }
    }
}

pub struct ChatRelay {
    upstream: Arc<dyn UpstreamClient>,
}

impl ChatRelay {
    pub fn new(upstream: Arc<dyn UpstreamClient>) -> Self {
        Self { upstream }
    }

    /// Aggregate path: one upstream call, one answer.
    pub async fn complete(
        &self,
        request_id: Uuid,
        message: &str,
        settings: RelaySettings,
    ) -> Result<String, RelayError> {
        let mut lifecycle = Lifecycle::start(request_id);
        let result = self.try_complete(&mut lifecycle, message, &settings).await;

        match &result {
            Ok(content) => {
                info!("[{}] response length: {} characters", request_id, content.len());
                lifecycle.finish("completed");
            }
            Err(e) => lifecycle.fail(e),
        }
        result
    }

    async fn try_complete(
        &self,
        lifecycle: &mut Lifecycle,
        message: &str,
        settings: &RelaySettings,
    ) -> Result<String, RelayError> {
        let config = settings.resolve().map_err(RelayError::Configuration)?;
        let payload = UpstreamPayload::single_turn(&config.model, message, false);

        lifecycle.advance(RelayPhase::AwaitingUpstream);
        match self
            .upstream
            .send(&payload, &config, UpstreamMode::Aggregate)
            .await?
        {
            UpstreamResponse::Completion(content) => Ok(content),
            UpstreamResponse::Stream(_) => Err(UpstreamError::MalformedResponse.into()),
        }
    }

    /// Streaming path. The returned stream always ends with exactly one
    /// terminal event (`Termination` or `Error`), unless upstream closes
    /// without `[DONE]`, in which case it just ends.
    ///
    /// Upstream is only read while the stream is being polled; dropping it
    /// drops the upstream connection with it.
    pub fn stream(
        &self,
        request_id: Uuid,
        message: String,
        settings: RelaySettings,
    ) -> impl Stream<Item = ClientEvent> + Send + 'static {
        let upstream = Arc::clone(&self.upstream);

        stream! {
            let mut lifecycle = Lifecycle::start(request_id);

            let config = match settings.resolve() {
                Ok(config) => config,
                Err(reason) => {
                    let e = RelayError::Configuration(reason);
                    lifecycle.fail(&e);
                    yield ClientEvent::from(e);
                    return;
                }
            };
            let payload = UpstreamPayload::single_turn(&config.model, &message, true);

            lifecycle.advance(RelayPhase::AwaitingUpstream);
            let chunks = match open_stream(upstream.as_ref(), &payload, &config).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    lifecycle.fail(&e);
                    yield ClientEvent::from(e);
                    return;
                }
            };

            lifecycle.advance(RelayPhase::Relaying);
            let mut events = Box::pin(decode_events(chunks));
            let mut relayed = 0usize;

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        let e = RelayError::Upstream(e);
                        lifecycle.fail(&e);
                        yield ClientEvent::from(e);
                        return;
                    }
                };

                let client_event = match translate(event) {
                    Some(client_event) => client_event,
                    None => continue,
                };
                let terminal = client_event.is_terminal();
                yield client_event;

                if terminal {
                    info!("[{}] relayed {} fragments", request_id, relayed);
                    lifecycle.finish("done");
                    return;
                }
                relayed += 1;
            }

            info!("[{}] upstream closed without [DONE] after {} fragments", request_id, relayed);
            lifecycle.finish("upstream closed");
        }
    }
}

async fn open_stream(
    upstream: &dyn UpstreamClient,
    payload: &UpstreamPayload,
    config: &RelayConfig,
) -> Result<ByteStream, RelayError> {
    match upstream.send(payload, config, UpstreamMode::Stream).await? {
        UpstreamResponse::Stream(chunks) => Ok(chunks),
        UpstreamResponse::Completion(_) => {
            Err(RelayError::Upstream(UpstreamError::MalformedResponse))
        }
    }
}

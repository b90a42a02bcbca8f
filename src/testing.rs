//! Scripted upstream for relay and handler tests.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};

use crate::config::RelayConfig;
use crate::upstream::{
    ByteStream, UpstreamClient, UpstreamError, UpstreamMode, UpstreamPayload, UpstreamResponse,
};

enum Script {
    Completion(String),
    Frames {
        frames: Vec<Result<&'static str, UpstreamError>>,
        hang: bool,
    },
    Fail(UpstreamError),
}

pub struct ScriptedUpstream {
    script: Script,
    calls: Mutex<Vec<(UpstreamPayload, RelayConfig, UpstreamMode)>>,
    reads: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl ScriptedUpstream {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
            reads: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn completion(text: &str) -> Arc<Self> {
        Self::new(Script::Completion(text.to_string()))
    }

    /// Streams the given chunks, then closes.
    pub fn frames(frames: &[&'static str]) -> Arc<Self> {
        Self::new(Script::Frames {
            frames: frames.iter().map(|f| Ok(*f)).collect(),
            hang: false,
        })
    }

    /// Streams the given chunks, then stalls forever.
    pub fn hanging(frames: &[&'static str]) -> Arc<Self> {
        Self::new(Script::Frames {
            frames: frames.iter().map(|f| Ok(*f)).collect(),
            hang: true,
        })
    }

    /// Streams the given chunks, then fails the connection.
    pub fn broken(frames: &[&'static str], error: UpstreamError) -> Arc<Self> {
        let mut frames: Vec<_> = frames.iter().map(|f| Ok(*f)).collect();
        frames.push(Err(error));
        Self::new(Script::Frames { frames, hang: false })
    }

    pub fn failing(error: UpstreamError) -> Arc<Self> {
        Self::new(Script::Fail(error))
    }

    pub fn calls(&self) -> Vec<(UpstreamPayload, RelayConfig, UpstreamMode)> {
        self.calls.lock().unwrap().clone()
    }

    /// Chunks handed out so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Whether the body stream has been dropped.
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn send(
        &self,
        payload: &UpstreamPayload,
        config: &RelayConfig,
        mode: UpstreamMode,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push((payload.clone(), config.clone(), mode));

        match &self.script {
            Script::Completion(text) => Ok(UpstreamResponse::Completion(text.clone())),
            Script::Fail(error) => Err(error.clone()),
            Script::Frames { frames, hang } => {
                let reads = Arc::clone(&self.reads);
                let body = stream::iter(frames.clone()).map(move |frame| {
                    reads.fetch_add(1, Ordering::SeqCst);
                    frame.map(|f| Bytes::from_static(f.as_bytes()))
                });
                let body: ByteStream = if *hang {
                    Box::pin(body.chain(stream::pending()))
                } else {
                    Box::pin(body)
                };

                Ok(UpstreamResponse::Stream(Box::pin(TrackedBody {
                    inner: body,
                    closed: Arc::clone(&self.closed),
                })))
            }
        }
    }
}

/// Body stream that records when it is dropped.
struct TrackedBody {
    inner: ByteStream,
    closed: Arc<AtomicBool>,
}

impl Stream for TrackedBody {
    type Item = Result<Bytes, UpstreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

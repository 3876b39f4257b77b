//! Scripted downstream client and recording sink for in-crate tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use tracing::Span;

use crate::fanout::client::{CallContext, DownstreamClient};
use crate::fanout::error::{FanOutError, WorkerError};
use crate::fanout::sink::OutcomeSink;
use crate::fanout::types::{AggregationOutcome, DelayReport, Tally};
use crate::observability::tracing::trace_id;

#[derive(Debug, Clone)]
pub(crate) enum Script {
    Delay(u64),
    SlowDelay(u64, Duration),
    Transport,
    Status(u16),
    Garbage,
    Hang,
}

/// Counts calls whose future was dropped before finishing.
struct InFlight {
    dropped: Arc<AtomicUsize>,
    done: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// What one call saw: its request id and the trace id of its span.
#[derive(Debug, Clone)]
pub(crate) struct SeenCall {
    pub request_id: Option<String>,
    pub trace_id: Option<String>,
}

#[derive(Default)]
pub(crate) struct StubClient {
    scripts: Mutex<VecDeque<Script>>,
    pub dropped: Arc<AtomicUsize>,
    pub calls: Mutex<Vec<SeenCall>>,
}

impl StubClient {
    pub(crate) fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }
}

impl DownstreamClient for StubClient {
    async fn get(&self, _url: &str, ctx: &CallContext) -> Result<Bytes, WorkerError> {
        self.calls.lock().unwrap().push(SeenCall {
            request_id: ctx.request_id.clone(),
            trace_id: trace_id(&Span::current()),
        });
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Transport);
        let mut guard = InFlight {
            dropped: Arc::clone(&self.dropped),
            done: false,
        };

        let result = match script {
            Script::Delay(ms) => Ok(Bytes::from(format!(r#"{{"delay":{ms}}}"#))),
            Script::SlowDelay(ms, wait) => {
                tokio::time::sleep(wait).await;
                Ok(Bytes::from(format!(r#"{{"delay":{ms}}}"#)))
            }
            Script::Transport => Err(WorkerError::Transport("connection refused".into())),
            Script::Status(code) => Err(WorkerError::Status(code)),
            Script::Garbage => Ok(Bytes::from_static(b"<html>oops</html>")),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };
        guard.done = true;
        result
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub workers: Mutex<Vec<(usize, Result<u64, &'static str>)>>,
    pub aggregates: Mutex<Vec<(Result<u64, &'static str>, Tally)>>,
}

impl OutcomeSink for RecordingSink {
    fn worker_finished(
        &self,
        worker: usize,
        result: &Result<DelayReport, WorkerError>,
        _elapsed: Duration,
    ) {
        let entry = result.as_ref().map(|r| r.delay_ms).map_err(|e| e.kind());
        self.workers.lock().unwrap().push((worker, entry));
    }

    fn aggregate_finished(&self, outcome: &Result<AggregationOutcome, FanOutError>, tally: Tally) {
        let entry = outcome.as_ref().map(|o| o.delay_ms).map_err(|e| e.kind());
        self.aggregates.lock().unwrap().push((entry, tally));
    }
}

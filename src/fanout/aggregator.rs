//! Fan-out delay aggregator.
//!
//! # Responsibilities
//! - Launch `workers` concurrent downstream calls per inbound request
//! - Wait until every worker reached a terminal state
//! - Combine successful delays with a locally simulated delay
//!
//! # Design Decisions
//! - Workers live in a `JoinSet` owned by the request; each hands its record
//!   back through its join handle, so no container is written concurrently
//! - Dropping the aggregation future aborts every worker task
//! - The inbound cancellation token is observed by every worker and by the
//!   local delay
//! - Every worker runs in its own client span under the caller's span, so
//!   each downstream call is a separate child in the trace

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::MiddlemanConfig;
use crate::fanout::client::{CallContext, DownstreamClient};
use crate::fanout::error::{FanOutError, WorkerError};
use crate::fanout::sink::OutcomeSink;
use crate::fanout::types::{
    AggregationOutcome, DelayReport, FanOutResult, LocalDelay, WorkerRecord,
};

/// Tunables for one aggregator.
#[derive(Debug, Clone)]
pub struct FanOutSettings {
    pub downstream_url: String,
    pub workers: usize,
    pub max_latency_ms: u64,
    pub worker_timeout: Duration,
    pub local_delay: LocalDelay,
}

impl From<&MiddlemanConfig> for FanOutSettings {
    fn from(config: &MiddlemanConfig) -> Self {
        Self {
            downstream_url: config.downstream_url.clone(),
            workers: config.workers,
            max_latency_ms: config.max_latency_ms,
            worker_timeout: Duration::from_millis(config.worker_timeout_ms),
            local_delay: LocalDelay::from_seed(config.local_delay_seed),
        }
    }
}

pub struct FanOutAggregator<C> {
    client: Arc<C>,
    sink: Arc<dyn OutcomeSink>,
    url: Arc<str>,
    settings: FanOutSettings,
}

impl<C: DownstreamClient> FanOutAggregator<C> {
    /// `settings.workers` is clamped to at least one.
    pub fn new(client: C, sink: Arc<dyn OutcomeSink>, mut settings: FanOutSettings) -> Self {
        settings.workers = settings.workers.max(1);
        Self {
            client: Arc::new(client),
            sink,
            url: Arc::from(settings.downstream_url.as_str()),
            settings,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn settings(&self) -> &FanOutSettings {
        &self.settings
    }

    /// Fan out, wait for every worker, and compose the aggregate delay.
    pub async fn run(
        &self,
        ctx: &CallContext,
        cancel: &CancellationToken,
    ) -> Result<AggregationOutcome, FanOutError> {
        let result = self.collect(ctx, cancel).await;
        let tally = result.tally();
        let outcome = self.compose(&result, cancel).await;
        self.sink.aggregate_finished(&outcome, tally);
        outcome
    }

    /// Run every worker to a terminal state. The result always holds
    /// `settings.workers` records.
    pub async fn collect(&self, ctx: &CallContext, cancel: &CancellationToken) -> FanOutResult {
        let workers = self.settings.workers;
        let mut set = JoinSet::new();

        for worker in 0..workers {
            let client = Arc::clone(&self.client);
            let sink = Arc::clone(&self.sink);
            let url = Arc::clone(&self.url);
            let call = ctx.clone();
            let cancel = cancel.clone();
            let timeout = self.settings.worker_timeout;
            let span = tracing::info_span!(
                "GET downstream",
                otel.kind = "client",
                http.url = %url,
                worker,
            );

            set.spawn(
                async move {
                    let started = Instant::now();
                    let result = call_downstream(&*client, &url, &call, timeout, &cancel).await;
                    sink.worker_finished(worker, &result, started.elapsed());
                    WorkerRecord { worker, result }
                }
                .instrument(span),
            );
        }

        let mut result = FanOutResult::with_capacity(workers);
        let mut finished = vec![false; workers];
        let mut aborted = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(record) => {
                    finished[record.worker] = true;
                    result.push(record);
                }
                Err(e) => aborted.push(e.to_string()),
            }
        }

        // A task that panicked never returned its id; pair leftovers up.
        let missing = finished.iter().enumerate().filter(|(_, done)| !**done);
        for ((worker, _), reason) in missing.zip(aborted) {
            let record = WorkerRecord {
                worker,
                result: Err(WorkerError::Aborted(reason)),
            };
            self.sink.worker_finished(worker, &record.result, Duration::ZERO);
            result.push(record);
        }

        result
    }

    async fn compose(
        &self,
        result: &FanOutResult,
        cancel: &CancellationToken,
    ) -> Result<AggregationOutcome, FanOutError> {
        if cancel.is_cancelled() {
            return Err(FanOutError::Cancelled);
        }
        if result.tally().succeeded == 0 {
            return Err(FanOutError::Exhausted {
                workers: result.worker_count(),
            });
        }

        let local_delay_ms = self.settings.local_delay.sample(self.settings.max_latency_ms);
        tracing::debug!(local_delay_ms, "Simulating local processing");
        tokio::select! {
            _ = cancel.cancelled() => return Err(FanOutError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(local_delay_ms)) => {}
        }

        AggregationOutcome::compose(result, local_delay_ms)
    }
}

async fn call_downstream<C: DownstreamClient>(
    client: &C,
    url: &str,
    ctx: &CallContext,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<DelayReport, WorkerError> {
    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
        res = tokio::time::timeout(timeout, client.get(url, ctx)) => match res {
            Ok(res) => res?,
            Err(_) => return Err(WorkerError::Timeout(timeout)),
        },
    };

    serde_json::from_slice(&body).map_err(|e| WorkerError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::testing::{RecordingSink, Script, StubClient};
    use crate::fanout::types::Tally;
    use crate::observability::tracing::{testing, trace_id};
    use std::sync::atomic::Ordering;

    fn settings(workers: usize, local_delay: LocalDelay) -> FanOutSettings {
        FanOutSettings {
            downstream_url: "http://receiver.test/rng".into(),
            workers,
            max_latency_ms: 1000,
            worker_timeout: Duration::from_secs(5),
            local_delay,
        }
    }

    fn aggregator(
        scripts: Vec<Script>,
        settings: FanOutSettings,
    ) -> (FanOutAggregator<StubClient>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = FanOutAggregator::new(StubClient::new(scripts), sink.clone(), settings);
        (aggregator, sink)
    }

    #[tokio::test]
    async fn test_mean_of_successes_plus_local_delay() {
        let (agg, sink) = aggregator(
            vec![Script::Delay(100), Script::Delay(200), Script::Transport],
            settings(3, LocalDelay::Fixed(50)),
        );

        let outcome = agg
            .run(&CallContext::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.delay_ms, 200);
        assert_eq!(serde_json::to_string(&outcome.report()).unwrap(), r#"{"delay":200}"#);

        assert_eq!(sink.workers.lock().unwrap().len(), 3);
        let aggregates = sink.aggregates.lock().unwrap();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(
            aggregates[0],
            (
                Ok(200),
                Tally {
                    succeeded: 2,
                    failed: 1,
                    cancelled: 0
                }
            )
        );
    }

    #[tokio::test]
    async fn test_all_workers_failing_exhausts() {
        let (agg, sink) = aggregator(
            vec![Script::Transport, Script::Transport],
            settings(2, LocalDelay::Fixed(50)),
        );

        let started = Instant::now();
        let err = agg
            .run(&CallContext::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FanOutError::Exhausted { workers: 2 }));
        // No local delay is simulated for a request that already failed.
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(sink.aggregates.lock().unwrap()[0].0, Err("exhausted"));
    }

    #[tokio::test]
    async fn test_every_failure_class_is_isolated() {
        let (agg, sink) = aggregator(
            vec![
                Script::Status(503),
                Script::Garbage,
                Script::Transport,
                Script::Delay(40),
            ],
            settings(4, LocalDelay::Fixed(0)),
        );

        let outcome = agg
            .run(&CallContext::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.delay_ms, 40);

        let mut kinds: Vec<_> = sink
            .workers
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, r)| r.err())
            .collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec!["decode", "status", "transport"]);
    }

    #[tokio::test]
    async fn test_waits_for_slow_worker() {
        let (agg, sink) = aggregator(
            vec![
                Script::Delay(10),
                Script::SlowDelay(400, Duration::from_millis(150)),
            ],
            settings(2, LocalDelay::Fixed(0)),
        );

        let started = Instant::now();
        let outcome = agg
            .run(&CallContext::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(150));
        // 205 only if the slow worker was included.
        assert_eq!(outcome.delay_ms, 205);
        assert_eq!(sink.workers.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_worker_timeout_is_a_failure() {
        let mut s = settings(2, LocalDelay::Fixed(0));
        s.worker_timeout = Duration::from_millis(50);
        let (agg, sink) = aggregator(vec![Script::Hang, Script::Delay(100)], s);

        let outcome = agg
            .run(&CallContext::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.delay_ms, 100);
        assert_eq!(agg.client().dropped.load(Ordering::SeqCst), 1);
        assert!(sink
            .workers
            .lock()
            .unwrap()
            .iter()
            .any(|(_, r)| *r == Err("timeout")));
    }

    #[tokio::test]
    async fn test_cancellation_reaches_in_flight_calls() {
        let (agg, sink) = aggregator(
            vec![Script::Hang, Script::Hang, Script::Hang],
            settings(3, LocalDelay::Fixed(0)),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = agg.run(&CallContext::default(), &cancel).await.unwrap_err();
        assert!(matches!(err, FanOutError::Cancelled));
        assert_eq!(agg.client().dropped.load(Ordering::SeqCst), 3);

        let workers = sink.workers.lock().unwrap();
        assert_eq!(workers.len(), 3);
        assert!(workers.iter().all(|(_, r)| *r == Err("cancelled")));
        assert_eq!(sink.aggregates.lock().unwrap()[0].1.cancelled, 3);
    }

    #[tokio::test]
    async fn test_cancellation_during_local_delay() {
        let (agg, _sink) = aggregator(
            vec![Script::Delay(10)],
            settings(1, LocalDelay::Fixed(10_000)),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = agg.run(&CallContext::default(), &cancel).await.unwrap_err();
        assert!(matches!(err, FanOutError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_seeded_runs_are_repeatable() {
        let scripts = || vec![Script::Delay(120), Script::Delay(80), Script::Status(500)];
        let mut s = settings(3, LocalDelay::Seeded(1234));
        s.max_latency_ms = 20;

        let (first, _) = aggregator(scripts(), s.clone());
        let (second, _) = aggregator(scripts(), s);
        let ctx = CallContext::default();
        let a = first.run(&ctx, &CancellationToken::new()).await.unwrap();
        let b = second.run(&ctx, &CancellationToken::new()).await.unwrap();
        assert_eq!(a, b);
        assert!((100..120).contains(&a.delay_ms));
    }

    #[tokio::test]
    async fn test_each_worker_gets_a_client_span_in_the_callers_trace() {
        let (_guard, exporter) = testing::capture_spans();
        let (agg, _sink) = aggregator(
            vec![Script::Delay(1), Script::Delay(2)],
            settings(2, LocalDelay::Fixed(0)),
        );

        let fanout = tracing::info_span!("fanout");
        let root_trace = trace_id(&fanout).unwrap();
        agg.run(&CallContext::new(Some("req-7".into())), &CancellationToken::new())
            .instrument(fanout)
            .await
            .unwrap();

        let calls = agg.client().calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        for call in calls.iter() {
            assert_eq!(call.trace_id.as_deref(), Some(root_trace.as_str()));
            assert_eq!(call.request_id.as_deref(), Some("req-7"));
        }

        let spans = exporter.get_finished_spans().unwrap();
        let parent = spans.iter().find(|s| s.name == "fanout").unwrap();
        let workers: Vec<_> = spans.iter().filter(|s| s.name == "GET downstream").collect();
        assert_eq!(workers.len(), 2);
        for worker in workers {
            assert_eq!(worker.span_kind, opentelemetry::trace::SpanKind::Client);
            assert_eq!(worker.parent_span_id, parent.span_context.span_id());
            assert_ne!(worker.span_context.span_id(), parent.span_context.span_id());
        }
    }

    #[test]
    fn test_zero_workers_clamped() {
        let (agg, _) = aggregator(vec![], settings(0, LocalDelay::Random));
        assert_eq!(agg.settings().workers, 1);
    }
}

//! Background worker draining the purchase feed.

use std::sync::{Arc, Mutex, PoisonError};

use iapkit_core::{BatchId, BatchOutcome, PurchaseBatch, ResponseCode, SessionId};
use iapkit_store::PurchaseStream;
use serde::Serialize;
use tokio::sync::{Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;

use crate::processing::ProcessingState;
use crate::processor::{PurchaseProcessor, RecordOutcome};

/// Counters over the lifetime of one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub batches_received: u64,
    pub records_validated: u64,
    pub records_finalized: u64,
    pub rejected: u64,
    pub validations_failed: u64,
    pub finalize_failed: u64,
    pub skipped_acknowledged: u64,
    pub skipped_duplicate: u64,
    pub canceled: u64,
    pub deferred: u64,
    pub failed_batches: u64,
    pub tasks_panicked: u64,
}

impl WorkerStats {
    fn record_batch(&mut self, report: &BatchReport) {
        self.batches_received += 1;
        match report.response_code {
            ResponseCode::Ok => {}
            ResponseCode::UserCanceled => self.canceled += 1,
            ResponseCode::Deferred => self.deferred += 1,
            ResponseCode::Error | ResponseCode::Unknown(_) => self.failed_batches += 1,
        }

        for outcome in &report.outcomes {
            match outcome {
                RecordOutcome::SkippedAcknowledged => self.skipped_acknowledged += 1,
                RecordOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
                RecordOutcome::Finalized { .. } => {
                    self.records_validated += 1;
                    self.records_finalized += 1;
                }
                RecordOutcome::Rejected => {
                    self.records_validated += 1;
                    self.rejected += 1;
                }
                RecordOutcome::ValidationFailed(_) => self.validations_failed += 1,
                RecordOutcome::Panicked => self.tasks_panicked += 1,
                RecordOutcome::FinalizeFailed(_) => {
                    self.records_validated += 1;
                    self.finalize_failed += 1;
                }
            }
        }
    }
}

/// Per-record outcomes of one dispatched batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub response_code: ResponseCode,
    pub outcomes: Vec<RecordOutcome>,
}

/// Routes a delivered batch by its response code.
///
/// Records of one batch are processed concurrently, bounded by the shared
/// semaphore. The processing flag is cleared once the whole batch has settled,
/// whatever the code.
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    processor: Arc<PurchaseProcessor>,
    processing: ProcessingState,
    permits: Arc<Semaphore>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl BatchDispatcher {
    pub fn new(
        processor: Arc<PurchaseProcessor>,
        processing: ProcessingState,
        max_concurrent: usize,
    ) -> Self {
        Self {
            processor,
            processing,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn dispatch(&self, batch: PurchaseBatch) -> BatchReport {
        let span = tracing::info_span!(
            "purchase_batch",
            batch_id = %batch.id,
            code = %batch.response_code,
            records = batch.results.len(),
        );

        async {
            let outcomes = match batch.outcome() {
                BatchOutcome::Purchased(_) => self.process_records(&batch).await,
                BatchOutcome::Canceled => {
                    tracing::info!("purchase canceled by user");
                    Vec::new()
                }
                BatchOutcome::Deferred => {
                    tracing::info!("purchase deferred; awaiting later delivery");
                    Vec::new()
                }
                BatchOutcome::Failed { code, error_code } => {
                    tracing::warn!(
                        code = %code,
                        error_code = ?error_code,
                        "purchase failed in store"
                    );
                    Vec::new()
                }
            };

            self.processing.clear();

            let report = BatchReport {
                batch_id: batch.id,
                response_code: batch.response_code,
                outcomes,
            };
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_batch(&report);
            report
        }
        .instrument(span)
        .await
    }

    async fn process_records(&self, batch: &PurchaseBatch) -> Vec<RecordOutcome> {
        let mut outcomes = Vec::with_capacity(batch.results.len());
        let mut tasks = JoinSet::new();

        for record in batch.unacknowledged() {
            let processor = self.processor.clone();
            let permits = self.permits.clone();
            let record = record.clone();
            tasks.spawn(
                async move {
                    let _permit = permits.acquire_owned().await;
                    processor.process(&record).await
                }
                .in_current_span(),
            );
        }

        let acknowledged = batch.results.len() - tasks.len();
        if acknowledged > 0 {
            tracing::debug!(acknowledged, "skipping already acknowledged purchases");
        }
        outcomes.extend(std::iter::repeat_n(
            RecordOutcome::SkippedAcknowledged,
            acknowledged,
        ));

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "purchase task panicked");
                    outcomes.push(RecordOutcome::Panicked);
                }
            }
        }
        outcomes
    }
}

/// Consumes the purchase feed until shutdown or until the store drops it.
pub struct PurchaseWorker {
    session_id: SessionId,
    dispatcher: BatchDispatcher,
    stream: PurchaseStream,
    shutdown: Arc<Notify>,
}

impl PurchaseWorker {
    pub fn new(session_id: SessionId, dispatcher: BatchDispatcher, stream: PurchaseStream) -> Self {
        Self {
            session_id,
            dispatcher,
            stream,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Spawn the worker loop on the current runtime.
    pub fn start(self) -> WorkerHandle {
        let Self {
            session_id,
            dispatcher,
            mut stream,
            shutdown,
        } = self;

        let stats = dispatcher.clone();
        let signal = shutdown.clone();
        let span = tracing::info_span!("purchase_worker", session_id = %session_id);
        let join = tokio::spawn(
            async move {
                tracing::info!("purchase worker started");
                loop {
                    tokio::select! {
                        biased;
                        _ = signal.notified() => {
                            tracing::info!("purchase worker shutting down");
                            break;
                        }
                        next = stream.recv() => match next {
                            Some(batch) => {
                                dispatcher.dispatch(batch).await;
                            }
                            None => {
                                tracing::info!("purchase feed closed");
                                break;
                            }
                        }
                    }
                }
                stream.close();
            }
            .instrument(span),
        );

        WorkerHandle {
            join,
            shutdown,
            dispatcher: stats,
        }
    }
}

/// Control handle for a running [`PurchaseWorker`].
#[derive(Debug)]
pub struct WorkerHandle {
    join: JoinHandle<()>,
    shutdown: Arc<Notify>,
    dispatcher: BatchDispatcher,
}

impl WorkerHandle {
    pub fn stats(&self) -> WorkerStats {
        self.dispatcher.stats()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop after the batch in progress, if any, and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "purchase worker task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use iapkit_core::{
        PlanState, PlatformEvidence, PurchaseRecord, Sku, TransactionId, ValidationVerdict,
    };
    use iapkit_store::{InMemoryStore, purchase_channel};
    use iapkit_validation::{ValidationError, Validator};

    use crate::entitlements::InMemoryEntitlements;
    use crate::finalizer::Finalizer;

    struct AcceptAll;

    #[async_trait]
    impl Validator for AcceptAll {
        async fn validate(
            &self,
            purchase: &PurchaseRecord,
        ) -> Result<ValidationVerdict, ValidationError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(ValidationVerdict::accepted(PlanState::for_accepted(
                purchase.product_id().clone(),
                None,
            )))
        }
    }

    fn purchase(tx: &str) -> PurchaseRecord {
        PurchaseRecord::new(
            Sku::new("credit_tier2").unwrap(),
            TransactionId::new(tx).unwrap(),
            PlatformEvidence::Android {
                package_name: "com.example.app".into(),
                purchase_token: format!("token-{tx}"),
            },
        )
    }

    fn dispatcher(store: Arc<InMemoryStore>, processing: ProcessingState) -> BatchDispatcher {
        let processor = PurchaseProcessor::new(
            Arc::new(AcceptAll),
            Finalizer::new(store),
            Arc::new(InMemoryEntitlements::new()),
            processing.clone(),
        );
        BatchDispatcher::new(Arc::new(processor), processing, 2)
    }

    #[tokio::test]
    async fn dispatch_processes_every_record_and_clears_flag() {
        let store = Arc::new(InMemoryStore::new());
        let processing = ProcessingState::new();
        processing.begin();
        let dispatcher = dispatcher(store.clone(), processing.clone());

        let batch = PurchaseBatch::ok(vec![
            purchase("GPA.1"),
            purchase("GPA.2"),
            purchase("GPA.3").into_acknowledged(),
        ]);
        let report = dispatcher.dispatch(batch).await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(store.finish_calls().len(), 2);
        assert!(!processing.is_processing());

        let stats = dispatcher.stats();
        assert_eq!(stats.batches_received, 1);
        assert_eq!(stats.records_finalized, 2);
        assert_eq!(stats.skipped_acknowledged, 1);
    }

    /// Panics on its first call, accepts afterwards.
    #[derive(Default)]
    struct CrashesFirst {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Validator for CrashesFirst {
        async fn validate(
            &self,
            purchase: &PurchaseRecord,
        ) -> Result<ValidationVerdict, ValidationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("validator crashed");
            }
            Ok(ValidationVerdict::accepted(PlanState::for_accepted(
                purchase.product_id().clone(),
                None,
            )))
        }
    }

    #[tokio::test]
    async fn panicked_task_does_not_strand_the_transaction() {
        let store = Arc::new(InMemoryStore::new());
        let validator = Arc::new(CrashesFirst::default());
        let processing = ProcessingState::new();
        let processor = PurchaseProcessor::new(
            validator.clone(),
            Finalizer::new(store.clone()),
            Arc::new(InMemoryEntitlements::new()),
            processing.clone(),
        );
        let dispatcher = BatchDispatcher::new(Arc::new(processor), processing.clone(), 2);

        let mut reports = Vec::new();
        for _ in 0..3 {
            processing.begin();
            reports.push(dispatcher.dispatch(PurchaseBatch::ok(vec![purchase("GPA.1")])).await);
            assert!(!processing.is_processing());
        }

        assert_eq!(reports[0].outcomes, vec![RecordOutcome::Panicked]);
        assert_eq!(
            reports[1].outcomes,
            vec![RecordOutcome::Finalized { accepted: true }]
        );
        assert_eq!(reports[2].outcomes, vec![RecordOutcome::SkippedDuplicate]);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.finish_calls().len(), 1);

        let stats = dispatcher.stats();
        assert_eq!(stats.tasks_panicked, 1);
        assert_eq!(stats.records_finalized, 1);
        assert_eq!(stats.skipped_duplicate, 1);
    }

    #[tokio::test]
    async fn non_ok_batches_only_clear_the_flag() {
        let store = Arc::new(InMemoryStore::new());
        let processing = ProcessingState::new();
        let dispatcher = dispatcher(store.clone(), processing.clone());

        for code in [ResponseCode::UserCanceled, ResponseCode::Deferred, ResponseCode::Unknown(7)] {
            processing.begin();
            let report = dispatcher.dispatch(PurchaseBatch::with_code(code)).await;
            assert!(report.outcomes.is_empty());
            assert!(!processing.is_processing());
        }

        let stats = dispatcher.stats();
        assert_eq!((stats.canceled, stats.deferred, stats.failed_batches), (1, 1, 1));
        assert!(store.finish_calls().is_empty());
    }

    #[tokio::test]
    async fn worker_drains_feed_until_shutdown() {
        let store = Arc::new(InMemoryStore::new());
        let processing = ProcessingState::new();
        let (feed, stream) = purchase_channel(4);
        let handle = PurchaseWorker::new(
            SessionId::new(),
            dispatcher(store.clone(), processing),
            stream,
        )
        .start();

        feed.post(PurchaseBatch::ok(vec![purchase("GPA.1")])).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.stats().batches_received == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("batch processed");

        handle.shutdown().await;
        assert_eq!(store.finish_calls().len(), 1);
        assert!(feed.is_closed());
    }

    #[tokio::test]
    async fn worker_stops_when_feed_is_dropped() {
        let store = Arc::new(InMemoryStore::new());
        let (feed, stream) = purchase_channel(1);
        let handle = PurchaseWorker::new(
            SessionId::new(),
            dispatcher(store, ProcessingState::new()),
            stream,
        )
        .start();

        drop(feed);
        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("worker exits");
    }
}

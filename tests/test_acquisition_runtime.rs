//! Integration tests for the acquisition runtime
//!
//! A scripted source stands in for the transaction service. Time is paused, so
//! the 3s retry delay elapses instantly while keeping exact instants.
//!
//! Key behaviours tested:
//! - Empty responses are retried with a fixed delay until data arrives
//! - The retry budget is bounded and terminal states stop all fetching
//! - Manual refresh resets the budget and supersedes pending work
//! - Cancel drops pending retries and late results

#[cfg(test)]
mod acquisition_runtime_tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use spendlens::acquisition::controller::{AcquisitionState, RetryPolicy};
    use spendlens::acquisition::source::{decode_payload, FetchError, TransactionSource};
    use spendlens::analytics::normalizer::RawRecord;
    use spendlens::engine::EngineSettings;
    use spendlens::runtime::{Command, Runtime, Snapshot};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::{mpsc, watch};
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    enum Reply {
        Records(Value),
        Empty,
        Status(u16),
        Slow(Duration, Value),
    }

    struct ScriptedSource {
        script: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransactionSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
            self.calls.lock().unwrap().push(Instant::now());
            let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Empty);

            match reply {
                Reply::Records(payload) => Ok(decode_payload(payload)),
                Reply::Empty => Ok(Vec::new()),
                Reply::Status(code) => Err(FetchError::Status(code)),
                Reply::Slow(delay, payload) => {
                    tokio::time::sleep(delay).await;
                    Ok(decode_payload(payload))
                }
            }
        }

        fn source_type(&self) -> &'static str {
            "scripted"
        }
    }

    fn transactions(category: &str, amounts: &[f64]) -> Value {
        let items: Vec<Value> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                json!({
                    "id": i + 1,
                    "timestamp": format!("2024-01-05T{:02}:15:00", 8 + i),
                    "amount": amount,
                    "category": category,
                    "merchant": "Corner Shop"
                })
            })
            .collect();
        json!({ "transactions": items, "total": amounts.len(), "page": 1 })
    }

    fn start(
        source: Arc<ScriptedSource>,
        policy: RetryPolicy,
    ) -> (mpsc::Sender<Command>, watch::Receiver<Snapshot>, JoinHandle<()>) {
        let (runtime, snapshots) = Runtime::new(source, policy, EngineSettings::default());
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let handle = tokio::spawn(runtime.run(commands_rx));
        (commands_tx, snapshots, handle)
    }

    async fn wait_terminal(snapshots: &mut watch::Receiver<Snapshot>) -> Snapshot {
        snapshots
            .wait_for(|s| s.state.is_terminal())
            .await
            .unwrap()
            .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_arrives_after_five_empty_responses() {
        let mut script: Vec<Reply> = (0..5).map(|_| Reply::Empty).collect();
        script.push(Reply::Records(transactions("Groceries", &[12.5, 40.0, 7.25])));
        let source = ScriptedSource::new(script);
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), RetryPolicy::default());

        // Every Retrying frame is observed: the runtime sleeps 3s after each one
        let mut retries = Vec::new();
        let snapshot = loop {
            snapshots.changed().await.unwrap();
            let snapshot = snapshots.borrow_and_update().clone();
            if let AcquisitionState::Retrying { attempt, .. } = snapshot.state {
                if retries.last() != Some(&attempt) {
                    retries.push(attempt);
                }
            }
            if snapshot.state.is_terminal() {
                break snapshot;
            }
        };

        assert_eq!(snapshot.state, AcquisitionState::Ready);
        assert_eq!(snapshot.views.record_count, 3);
        assert_eq!(snapshot.views.categories.grand_total, 59.75);
        assert_eq!(retries, vec![1, 2, 3, 4, 5]);

        let calls = source.calls();
        assert_eq!(calls.len(), 6, "1 initial fetch + 5 retries");
        for pair in calls.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(3_000), "gap {:?}", gap);
            assert!(gap < Duration::from_millis(3_100), "gap {:?}", gap);
        }

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_empty_stops_after_max_retries() {
        let source = ScriptedSource::new(Vec::new());
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), RetryPolicy::default());

        let snapshot = wait_terminal(&mut snapshots).await;
        assert_eq!(snapshot.state, AcquisitionState::Empty);
        assert_eq!(snapshot.views.record_count, 0);
        assert_eq!(source.calls().len(), 6);

        // No further retries once terminal
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls().len(), 6);
        assert_eq!(snapshots.borrow().state, AcquisitionState::Empty);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_end_in_failed_state() {
        let source = ScriptedSource::new(vec![
            Reply::Status(503),
            Reply::Status(503),
            Reply::Status(502),
        ]);
        let policy = RetryPolicy {
            max_retries: 2,
            delay: Duration::from_millis(500),
        };
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), policy);

        let snapshot = wait_terminal(&mut snapshots).await;
        match &snapshot.state {
            AcquisitionState::Failed { reason } => assert!(reason.contains("502"), "{}", reason),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(source.calls().len(), 3);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_recovers_from_empty() {
        let source = ScriptedSource::new(vec![
            Reply::Empty,
            Reply::Empty,
            Reply::Records(transactions("Travel", &[300.0])),
        ]);
        let policy = RetryPolicy {
            max_retries: 1,
            delay: Duration::from_secs(3),
        };
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), policy);

        let snapshot = wait_terminal(&mut snapshots).await;
        assert_eq!(snapshot.state, AcquisitionState::Empty);

        commands.send(Command::Refresh).await.unwrap();
        let snapshot = snapshots
            .wait_for(|s| s.state == AcquisitionState::Ready)
            .await
            .unwrap()
            .clone();

        assert_eq!(snapshot.views.category_domain, vec!["Travel"]);
        assert_eq!(source.calls().len(), 3);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_during_retry_wait_resets_budget() {
        // With one retry allowed, reaching Ready proves the refresh reset the counter
        let source = ScriptedSource::new(vec![
            Reply::Empty,
            Reply::Empty,
            Reply::Records(transactions("Groceries", &[9.0])),
        ]);
        let policy = RetryPolicy {
            max_retries: 1,
            delay: Duration::from_secs(3),
        };
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), policy);

        snapshots
            .wait_for(|s| matches!(s.state, AcquisitionState::Retrying { .. }))
            .await
            .unwrap();
        let refreshed_at = Instant::now();
        commands.send(Command::Refresh).await.unwrap();

        let snapshot = snapshots
            .wait_for(|s| s.state.is_terminal())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.state, AcquisitionState::Ready);

        // The superseded timer never fires a fetch of its own
        tokio::time::sleep(Duration::from_secs(30)).await;
        let calls = source.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[2] - refreshed_at >= Duration::from_secs(3));

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fetch_result_is_never_applied() {
        let source = ScriptedSource::new(vec![
            Reply::Slow(Duration::from_secs(5), transactions("Stale", &[1.0, 2.0])),
            Reply::Records(transactions("Fresh", &[50.0])),
        ]);
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), RetryPolicy::default());

        snapshots
            .wait_for(|s| matches!(s.state, AcquisitionState::Loading { .. }))
            .await
            .unwrap();
        commands.send(Command::Refresh).await.unwrap();

        let snapshot = snapshots
            .wait_for(|s| s.state == AcquisitionState::Ready)
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.views.category_domain, vec!["Fresh"]);

        // Long after the slow response would have landed
        tokio::time::sleep(Duration::from_secs(10)).await;
        let snapshot = snapshots.borrow().clone();
        assert_eq!(snapshot.views.category_domain, vec!["Fresh"]);
        assert_eq!(snapshot.views.record_count, 1);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_retry() {
        let source = ScriptedSource::new(vec![
            Reply::Empty,
            Reply::Records(transactions("Groceries", &[4.0])),
        ]);
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), RetryPolicy::default());

        snapshots
            .wait_for(|s| matches!(s.state, AcquisitionState::Retrying { .. }))
            .await
            .unwrap();
        commands.send(Command::Cancel).await.unwrap();
        snapshots
            .wait_for(|s| s.state == AcquisitionState::Idle)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls().len(), 1);
        assert_eq!(snapshots.borrow().state, AcquisitionState::Idle);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_typed_fields_keep_valid_records() {
        let source = ScriptedSource::new(vec![Reply::Records(json!({
            "transactions": [
                {"id": 1, "timestamp": 1704445200, "amount": 5.0},
                {"id": 2, "timestamp": "2024-01-05T09:00:00", "amount": 5.0, "merchant": 42}
            ]
        }))]);
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), RetryPolicy::default());

        let snapshot = wait_terminal(&mut snapshots).await;
        assert_eq!(snapshot.state, AcquisitionState::Ready);
        assert_eq!(snapshot.views.record_count, 1);
        assert_eq!(snapshot.views.ranking[0].record.id.to_string(), "2");
        assert_eq!(source.calls().len(), 1);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_malformed_response_is_ready_without_retry() {
        let source = ScriptedSource::new(vec![Reply::Records(json!([
            {"id": 1, "timestamp": "yesterday", "amount": 5.0},
            {"id": 2, "timestamp": "2024-01-05T09:00:00", "amount": "n/a"},
            "junk"
        ]))]);
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), RetryPolicy::default());

        let snapshot = wait_terminal(&mut snapshots).await;
        assert_eq!(snapshot.state, AcquisitionState::Ready);
        assert_eq!(snapshot.views.record_count, 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls().len(), 1);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_direction_survives_set_replacement() {
        let source = ScriptedSource::new(vec![
            Reply::Records(transactions("Groceries", &[5.0, 80.0, 12.0])),
            Reply::Records(transactions("Groceries", &[3.0, 1.0])),
        ]);
        let (commands, mut snapshots, handle) = start(Arc::clone(&source), RetryPolicy::default());
        wait_terminal(&mut snapshots).await;

        commands.send(Command::ToggleDirection).await.unwrap();
        commands.send(Command::Refresh).await.unwrap();

        let snapshot = snapshots
            .wait_for(|s| s.state == AcquisitionState::Ready && s.views.record_count == 2)
            .await
            .unwrap()
            .clone();
        let amounts: Vec<f64> = snapshot.views.ranking.iter().map(|e| e.record.amount).collect();
        assert_eq!(amounts, vec![1.0, 3.0]);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }
}

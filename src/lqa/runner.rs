use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::LqaResult;
use super::batch::{LqaSettings, process_lqa_batch, review_pair};
use crate::llm::LlmClient;

const PAUSE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum LqaEvent {
    Progress { current: usize, total: usize },
    Result(LqaResult),
    BatchComplete { start: usize, end: usize },
    Error { row: usize, message: String },
    Finished { reviewed: usize, stopped: bool },
}

/// One request per batch, or one request per pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LqaMode {
    #[default]
    Batch,
    Pair,
}

/// Shared pause/stop switches for a running review
#[derive(Debug, Clone, Default)]
pub struct LqaControl {
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl LqaControl {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("LQA paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("LQA resumed");
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        info!("LQA stopped");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Block while paused; false once stopped
    async fn checkpoint(&self) -> bool {
        while self.is_paused() && !self.is_stopped() {
            tokio::time::sleep(PAUSE_POLL).await;
        }
        !self.is_stopped()
    }
}

pub struct LqaHandle {
    pub events: mpsc::Receiver<LqaEvent>,
    pub control: LqaControl,
    task: JoinHandle<()>,
}

impl LqaHandle {
    /// Drain events and return every result received
    pub async fn wait(mut self) -> Vec<LqaResult> {
        let mut results = Vec::new();
        while let Some(event) = self.events.recv().await {
            if let LqaEvent::Result(result) = event {
                results.push(result);
            }
        }
        if let Err(e) = self.task.await {
            error!("LQA task panicked: {}", e);
        }
        results
    }
}

/// Reviews (source, target) pairs in batches on a background task
pub struct LqaRunner {
    client: Arc<dyn LlmClient>,
    template: String,
    pairs: Vec<(String, String)>,
    settings: LqaSettings,
    mode: LqaMode,
    control: LqaControl,
}

impl LqaRunner {
    pub fn new(client: Arc<dyn LlmClient>, template: String, pairs: Vec<(String, String)>, settings: LqaSettings) -> Self {
        Self {
            client,
            template,
            pairs,
            settings,
            mode: LqaMode::Batch,
            control: LqaControl::default(),
        }
    }

    pub fn with_mode(mut self, mode: LqaMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn control(&self) -> LqaControl {
        self.control.clone()
    }

    async fn run_batch(&self, start: usize, end: usize, tx: &mpsc::Sender<LqaEvent>) -> usize {
        let results = process_lqa_batch(
            self.client.as_ref(),
            &self.template,
            &self.pairs[start..end],
            start,
            &self.settings,
        )
        .await;

        let mut seen = HashSet::new();
        for result in results.into_iter().filter(|r| (start..end).contains(&r.id)) {
            if seen.insert(result.id) {
                let _ = tx.send(LqaEvent::Result(result)).await;
            }
        }
        for row in (start..end).filter(|row| !seen.contains(row)) {
            let _ = tx
                .send(LqaEvent::Error {
                    row,
                    message: "No review returned for this row".to_string(),
                })
                .await;
        }
        let _ = tx.send(LqaEvent::Progress { current: end, total: self.pairs.len() }).await;
        seen.len()
    }

    async fn run_pairs(&self, start: usize, end: usize, tx: &mpsc::Sender<LqaEvent>) -> usize {
        let mut reviewed = 0;
        for row in start..end {
            if !self.control.checkpoint().await {
                break;
            }
            let (source, target) = &self.pairs[row];
            match review_pair(self.client.as_ref(), &self.template, row, source, target, &self.settings).await {
                Ok(result) => {
                    reviewed += 1;
                    let _ = tx.send(LqaEvent::Result(result)).await;
                }
                Err(e) => {
                    error!("LQA failed for row {}: {}", row + 1, e);
                    let _ = tx
                        .send(LqaEvent::Error {
                            row,
                            message: format!("LQA failed: {}", e),
                        })
                        .await;
                }
            }
            let _ = tx.send(LqaEvent::Progress { current: row + 1, total: self.pairs.len() }).await;
        }
        reviewed
    }

    async fn run(self, tx: mpsc::Sender<LqaEvent>) {
        let total = self.pairs.len();
        let batch_size = self.settings.batch_size.max(1);
        info!("Starting LQA of {} rows in batches of {}", total, batch_size);

        let mut reviewed = 0;
        for start in (0..total).step_by(batch_size) {
            if !self.control.checkpoint().await {
                break;
            }
            let end = (start + batch_size).min(total);
            reviewed += match self.mode {
                LqaMode::Batch => self.run_batch(start, end, &tx).await,
                LqaMode::Pair => self.run_pairs(start, end, &tx).await,
            };
            let _ = tx.send(LqaEvent::BatchComplete { start, end }).await;
        }

        let stopped = self.control.is_stopped();
        info!("LQA finished: {} of {} rows reviewed{}", reviewed, total, if stopped { " (stopped)" } else { "" });
        let _ = tx.send(LqaEvent::Finished { reviewed, stopped }).await;
    }

    pub fn spawn(self) -> LqaHandle {
        let (tx, events) = mpsc::channel(64);
        let control = self.control.clone();
        let task = tokio::spawn(self.run(tx));
        LqaHandle { events, control, task }
    }
}

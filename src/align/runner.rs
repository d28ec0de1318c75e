use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::AnchorMode;
use super::semantic::fill_alignment_gaps;
use super::timeline::align_subtitles;
use crate::config::AlignmentConfig;
use crate::llm::LlmClient;
use crate::project::SubtitleRow;
use crate::prompts::PromptStore;
use crate::subtitle::Cue;

#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentEvent {
    Progress(String),
    Finished(Vec<SubtitleRow>),
    Failed(String),
}

/// Timeline alignment followed by optional LLM gap filling
pub struct AlignmentJob {
    source: Vec<Cue>,
    target: Vec<Cue>,
    mode: AnchorMode,
    client: Option<Arc<dyn LlmClient>>,
    prompts: PromptStore,
    auto_fill: bool,
    fill_max_retries: u32,
    fill_batch_size: usize,
    cancelled: Arc<AtomicBool>,
}

/// Running job: event stream plus a cancel switch
pub struct AlignmentHandle {
    pub events: mpsc::Receiver<AlignmentEvent>,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl AlignmentHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Drain events until the job ends and return the rows, if any
    pub async fn wait(mut self) -> Option<Vec<SubtitleRow>> {
        let mut rows = None;
        while let Some(event) = self.events.recv().await {
            if let AlignmentEvent::Finished(result) = event {
                rows = Some(result);
            }
        }
        if let Err(e) = self.task.await {
            error!("Alignment task panicked: {}", e);
        }
        rows
    }
}

impl AlignmentJob {
    pub fn new(source: Vec<Cue>, target: Vec<Cue>, mode: AnchorMode) -> Self {
        Self {
            source,
            target,
            mode,
            client: None,
            prompts: PromptStore::default(),
            auto_fill: false,
            fill_max_retries: 3,
            fill_batch_size: 10,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enable gap filling with the given client and settings
    pub fn with_gap_filling(mut self, client: Arc<dyn LlmClient>, prompts: PromptStore, config: &AlignmentConfig) -> Self {
        self.client = Some(client);
        self.prompts = prompts;
        self.auto_fill = config.auto_fill;
        self.fill_max_retries = config.fill_max_retries;
        self.fill_batch_size = config.fill_batch_size;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn run(self, tx: mpsc::Sender<AlignmentEvent>) {
        let send = |event: AlignmentEvent| {
            let tx = tx.clone();
            async move {
                // Receiver gone means nobody is listening; keep working
                let _ = tx.send(event).await;
            }
        };

        send(AlignmentEvent::Progress(format!("Starting {} alignment", self.mode.resolve()))).await;
        let rows = align_subtitles(&self.source, &self.target, self.mode);
        send(AlignmentEvent::Progress(format!("Timeline alignment complete: {} rows", rows.len()))).await;

        if self.is_cancelled() {
            info!("Alignment cancelled");
            send(AlignmentEvent::Failed("Alignment cancelled".to_string())).await;
            return;
        }

        let rows = match (&self.client, self.auto_fill) {
            (Some(client), true) => {
                let gaps = rows
                    .iter()
                    .filter(|r| r.source.is_empty() || r.target.is_empty())
                    .count();
                if gaps == 0 {
                    send(AlignmentEvent::Progress("No gaps, skipping LLM fill".to_string())).await;
                    rows
                } else {
                    send(AlignmentEvent::Progress(format!("Filling {} gaps with LLM", gaps))).await;
                    let all_source: Vec<String> = self.source.iter().map(|c| c.text.clone()).collect();
                    let all_target: Vec<String> = self.target.iter().map(|c| c.text.clone()).collect();
                    let filled = fill_alignment_gaps(
                        client.as_ref(),
                        &self.prompts,
                        rows,
                        &all_source,
                        &all_target,
                        self.fill_max_retries,
                        self.fill_batch_size,
                        &self.cancelled,
                    )
                    .await;
                    let left = filled
                        .iter()
                        .filter(|r| r.source.is_empty() || r.target.is_empty())
                        .count();
                    send(AlignmentEvent::Progress(format!(
                        "LLM fill complete: {} gaps filled",
                        gaps.saturating_sub(left)
                    )))
                    .await;
                    filled
                }
            }
            _ => rows,
        };

        if self.is_cancelled() {
            info!("Alignment cancelled");
            send(AlignmentEvent::Failed("Alignment cancelled".to_string())).await;
            return;
        }
        send(AlignmentEvent::Progress(format!("Alignment complete: {} rows", rows.len()))).await;
        send(AlignmentEvent::Finished(rows)).await;
    }

    /// Run on the tokio runtime and stream events back
    pub fn spawn(self) -> AlignmentHandle {
        let (tx, events) = mpsc::channel(32);
        let cancelled = self.cancelled.clone();
        let task = tokio::spawn(self.run(tx));
        AlignmentHandle { events, cancelled, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlmClient, Usage};

    fn cues(items: &[(i64, i64, &str)]) -> Vec<Cue> {
        items.iter().map(|(s, e, t)| Cue::new(*s, *e, *t)).collect()
    }

    #[tokio::test]
    async fn test_job_without_fill() {
        let job = AlignmentJob::new(
            cues(&[(0, 1000, "Hi"), (2000, 3000, "Bye")]),
            cues(&[(0, 1000, "嗨"), (2000, 3000, "再见")]),
            AnchorMode::Source,
        );
        let mut handle = job.spawn();

        let mut progress = 0;
        let mut rows = None;
        while let Some(event) = handle.events.recv().await {
            match event {
                AlignmentEvent::Progress(_) => progress += 1,
                AlignmentEvent::Finished(result) => rows = Some(result),
                AlignmentEvent::Failed(msg) => panic!("unexpected failure: {}", msg),
            }
        }
        assert!(progress >= 2);
        assert_eq!(rows.unwrap()[1].target.text, "再见");
    }

    #[tokio::test]
    async fn test_job_fills_gaps() {
        let mut mock = MockLlmClient::new();
        mock.expect_generate().times(1).returning(|_| {
            Ok(LlmResponse {
                text: r#"[{"source": "Bye", "target": "再见"}]"#.to_string(),
                model: "mock".to_string(),
                usage: Usage::default(),
            })
        });

        let config = AlignmentConfig::default();
        let job = AlignmentJob::new(
            cues(&[(0, 1000, "Hi"), (2000, 3000, "Bye")]),
            cues(&[(0, 1000, "嗨"), (5000, 6000, "再见")]),
            AnchorMode::Source,
        )
        .with_gap_filling(Arc::new(mock), PromptStore::default(), &config);

        let rows = job.spawn().wait().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].target.text, "再见");
    }

    #[tokio::test]
    async fn test_cancel_during_gap_fill_skips_remaining_batches() {
        let config = AlignmentConfig { fill_batch_size: 1, ..AlignmentConfig::default() };
        let job = AlignmentJob::new(
            cues(&[(0, 1000, "A"), (2000, 3000, "B"), (4000, 5000, "C")]),
            cues(&[(0, 1000, "甲"), (9000, 9500, "乙"), (9600, 9900, "丙")]),
            AnchorMode::Source,
        );
        let flag = job.cancelled.clone();
        let mut mock = MockLlmClient::new();
        mock.expect_generate().times(1).returning(move |_| {
            flag.store(true, Ordering::SeqCst);
            Ok(LlmResponse {
                text: r#"[{"source": "B", "target": "乙"}]"#.to_string(),
                model: "mock".to_string(),
                usage: Usage::default(),
            })
        });
        let mut handle = job.with_gap_filling(Arc::new(mock), PromptStore::default(), &config).spawn();

        let mut failed = false;
        let mut finished = false;
        while let Some(event) = handle.events.recv().await {
            match event {
                AlignmentEvent::Failed(_) => failed = true,
                AlignmentEvent::Finished(_) => finished = true,
                AlignmentEvent::Progress(_) => {}
            }
        }
        assert!(failed);
        assert!(!finished);
    }

    #[tokio::test]
    async fn test_cancelled_job_reports_failure() {
        let job = AlignmentJob::new(cues(&[(0, 1000, "Hi")]), Vec::new(), AnchorMode::Source);
        job.cancelled.store(true, Ordering::SeqCst);
        let mut handle = job.spawn();

        let mut failed = false;
        while let Some(event) = handle.events.recv().await {
            if matches!(event, AlignmentEvent::Failed(_)) {
                failed = true;
            }
        }
        assert!(failed);
    }
}

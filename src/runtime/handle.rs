use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tracing::warn;

use crate::adapters::overrides::TuningRules;
use crate::adapters::emulate::EmulationPlan;
use crate::adapters::{Pipeline, PipelineConfig};
use crate::archive::{ArchiveError, UpdateSink};
use crate::model::contest::ContestInfo;
use crate::model::run::RunInfo;
use crate::runtime::events::PipelineEvent;
use crate::state::StateTracker;
use crate::types::RunId;
use crate::update::{ContestUpdate, StoredUpdate};

/// Runtime failure surfaced through command replies.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Journal failure.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    /// The runtime loop is gone.
    #[error("pipeline channel closed")]
    ChannelClosed,
}

/// Pipeline runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Adapter chain flags.
    pub pipeline: PipelineConfig,
    /// Journal batch size bound.
    pub batch_max_updates: usize,
    /// Journal batch latency bound.
    pub batch_max_latency_ms: u64,
    /// Journal queue bound.
    pub journal_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            batch_max_updates: 32,
            batch_max_latency_ms: 75,
            journal_queue_bound: 64,
        }
    }
}

/// Cloneable handle over the pipeline loop.
pub struct PipelineHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<PipelineEvent>,
}

impl Clone for PipelineHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    Info {
        resp: oneshot::Sender<Option<Arc<ContestInfo>>>,
    },
    Run {
        id: RunId,
        resp: oneshot::Sender<Option<RunInfo>>,
    },
    Runs {
        resp: oneshot::Sender<Vec<RunInfo>>,
    },
    ApplyTuning {
        rules: TuningRules,
        resp: oneshot::Sender<()>,
    },
    Flush {
        resp: oneshot::Sender<Result<u64, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum JournalMsg {
    Updates(Vec<StoredUpdate>),
    Flush {
        resp: oneshot::Sender<Result<u64, ArchiveError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the pipeline loop over a normalized update stream.
///
/// Updates flow: upstream -> input dedup -> adapter chain -> output dedup ->
/// broadcast + optional journal. Queries answer from the adapted output
/// state. Stage timers and tuning changes merge into the same loop, so all
/// recomputation is single-threaded with respect to the pipeline.
pub fn spawn_pipeline(
    updates: mpsc::Receiver<ContestUpdate>,
    sink: Option<Box<dyn UpdateSink>>,
    config: RuntimeConfig,
) -> PipelineHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<PipelineEvent>(1024);

    let (journal_tx_opt, mut durable_rx) = if let Some(sink) = sink {
        let (journal_tx, journal_rx) = mpsc::channel::<JournalMsg>(config.journal_queue_bound);
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<u64, ArchiveError>>();
        spawn_journal_worker(sink, journal_rx, durable_tx, config.clone());
        (Some(journal_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut updates = updates;
        let mut pipeline = Pipeline::new(&config.pipeline);
        let mut input = StateTracker::new();
        let mut output = StateTracker::new();
        let mut seq: u64 = 0;
        let mut feed_open = true;
        let mut durable_open = durable_rx.is_some();

        loop {
            let sleep_for = pipeline
                .next_deadline()
                .map(|d| Duration::from_millis(d.saturating_sub(now_ms())));

            tokio::select! {
                upd = updates.recv(), if feed_open => match upd {
                    Some(update) => {
                        if input.apply(update.clone()).is_some() {
                            let produced = pipeline.process(update);
                            emit(&mut output, produced, &events_tx_loop, journal_tx_opt.as_ref(), &mut seq);
                        }
                    }
                    None => {
                        feed_open = false;
                        let _ = events_tx_loop.send(PipelineEvent::FeedClosed);
                    }
                },
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    let done = handle_command(
                        cmd,
                        &mut pipeline,
                        &mut output,
                        &events_tx_loop,
                        journal_tx_opt.as_ref(),
                        &mut seq,
                    )
                    .await;
                    if done {
                        break;
                    }
                }
                durable = recv_durable(&mut durable_rx), if durable_open => match durable {
                    Some(Ok(durable_seq)) => {
                        let _ = events_tx_loop.send(PipelineEvent::DurableUpTo { seq: durable_seq });
                    }
                    Some(Err(err)) => warn!(%err, "journal append failed"),
                    None => durable_open = false,
                },
                _ = tokio::time::sleep(sleep_for.unwrap_or(Duration::ZERO)), if sleep_for.is_some() => {
                    let produced = pipeline.on_timer(now_ms());
                    emit(&mut output, produced, &events_tx_loop, journal_tx_opt.as_ref(), &mut seq);
                }
            }
        }
    });

    PipelineHandle { cmd_tx, events_tx }
}

/// Spawns an emulation replay of a finalized history at the given speed.
///
/// Every historical update is re-emitted at `recorded_time / speed` from now,
/// through a fresh pipeline.
pub fn spawn_emulation(
    history: Vec<ContestUpdate>,
    speed: f64,
    config: RuntimeConfig,
) -> PipelineHandle {
    let (tx, rx) = mpsc::channel(256);
    let start_wall_ms = now_ms();
    let plan = EmulationPlan::build(&history, start_wall_ms, speed);

    tokio::spawn(async move {
        let begin = Instant::now();
        for item in plan.items {
            let offset = item.at_ms.saturating_sub(start_wall_ms);
            tokio::time::sleep_until(begin + Duration::from_millis(offset)).await;
            if tx.send(item.update).await.is_err() {
                return;
            }
        }
    });

    spawn_pipeline(rx, None, config)
}

impl PipelineHandle {
    /// Subscribes to the outgoing event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events_tx.subscribe()
    }

    /// Latest adapted contest info.
    pub async fn info(&self) -> Result<Option<Arc<ContestInfo>>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Info { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Latest adapted value of one run.
    pub async fn run(&self, id: impl Into<RunId>) -> Result<Option<RunInfo>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Run {
                id: id.into(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Snapshot of every known run, ordered by `(time, id)`.
    pub async fn runs(&self) -> Result<Vec<RunInfo>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Runs { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Replaces the live tuning override rules.
    pub async fn apply_tuning(&self, rules: TuningRules) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ApplyTuning { rules, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Forces the journal to durability, returning the flushed sequence.
    pub async fn flush(&self) -> Result<u64, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Flush { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Stops the loop, flushing the journal first.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

async fn recv_durable(
    rx: &mut Option<mpsc::UnboundedReceiver<Result<u64, ArchiveError>>>,
) -> Option<Result<u64, ArchiveError>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

/// Applies produced updates to the output state, broadcasting and journaling
/// the ones that changed anything.
fn emit(
    output: &mut StateTracker,
    produced: Vec<ContestUpdate>,
    events_tx: &broadcast::Sender<PipelineEvent>,
    journal_tx: Option<&mpsc::Sender<JournalMsg>>,
    seq: &mut u64,
) {
    let mut batch = Vec::new();
    for update in produced {
        if output.apply(update.clone()).is_none() {
            continue;
        }
        *seq += 1;
        if journal_tx.is_some() {
            batch.push(StoredUpdate {
                seq: *seq,
                ts_ms: now_ms(),
                update: update.clone(),
            });
        }
        let _ = events_tx.send(PipelineEvent::Update(update));
    }
    if let (Some(tx), false) = (journal_tx, batch.is_empty()) {
        if tx.try_send(JournalMsg::Updates(batch)).is_err() {
            warn!("journal queue full, dropping batch");
        }
    }
}

async fn handle_command(
    cmd: Command,
    pipeline: &mut Pipeline,
    output: &mut StateTracker,
    events_tx: &broadcast::Sender<PipelineEvent>,
    journal_tx: Option<&mpsc::Sender<JournalMsg>>,
    seq: &mut u64,
) -> bool {
    match cmd {
        Command::Info { resp } => {
            let _ = resp.send(output.info().cloned());
        }
        Command::Run { id, resp } => {
            let _ = resp.send(output.run(&id).cloned());
        }
        Command::Runs { resp } => {
            let mut runs: Vec<RunInfo> = output.runs().values().cloned().collect();
            runs.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
            let _ = resp.send(runs);
        }
        Command::ApplyTuning { rules, resp } => {
            let produced = pipeline.apply_tuning(&rules);
            emit(output, produced, events_tx, journal_tx, seq);
            let _ = resp.send(());
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = journal_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx.send(JournalMsg::Flush { resp: flush_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(*seq)
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = journal_tx {
                let (done_tx, done_rx) = oneshot::channel();
                if tx.send(JournalMsg::Shutdown { resp: done_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }
    false
}

fn spawn_journal_worker(
    sink: Box<dyn UpdateSink>,
    mut rx: mpsc::Receiver<JournalMsg>,
    durable_tx: mpsc::UnboundedSender<Result<u64, ArchiveError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut buf = Vec::<StoredUpdate>::new();
        let mut deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
        let mut last_durable: u64 = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx).await;
                        break;
                    };

                    match msg {
                        JournalMsg::Updates(mut updates) => {
                            buf.append(&mut updates);
                            if buf.len() >= config.batch_max_updates {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx).await;
                                deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                            }
                        }
                        JournalMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        JournalMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx).await;
                    deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn UpdateSink>>>,
    buf: &mut Vec<StoredUpdate>,
    last_durable: &mut u64,
    durable_tx: &mpsc::UnboundedSender<Result<u64, ArchiveError>>,
) -> Result<(), ArchiveError> {
    if buf.is_empty() {
        return Ok(());
    }

    let updates = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let append_res: Result<u64, ArchiveError> = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.append_updates(&updates)?;
        sink.flush()?;
        Ok(seq)
    })
    .await
    .map_err(|e| ArchiveError::Message(format!("join error: {e}")))?;

    match append_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            let _ = durable_tx.send(Err(ArchiveError::Message(format!("append failed: {err:?}"))));
            Err(err)
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

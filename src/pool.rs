use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::tracker::CompletionTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub url: String,
    pub depth: usize,
}

/// Executes one task. Implementations submit follow-up tasks through the
/// handle they are given, which keeps the tracker's ordering invariant:
/// children are counted before the parent's finish.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, task: Task, submitter: &Submitter);
}

#[derive(Clone)]
pub struct Submitter {
    tx: mpsc::UnboundedSender<Task>,
    tracker: Arc<CompletionTracker>,
}

impl Submitter {
    pub fn submit(&self, task: Task) {
        // Count before enqueueing so a finishing sibling can never observe a
        // drained run while this task is in transit.
        self.tracker.on_submit();
        if self.tx.send(task).is_err() {
            self.tracker.on_discard();
        }
    }
}

// Fixed set of workers over one unbounded queue. The queue must be unbounded:
// tasks submit from inside worker slots, and a bounded queue would let the
// producers deadlock against themselves.
pub struct WorkerPool {
    submitter: Submitter,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(
        workers: usize,
        tracker: Arc<CompletionTracker>,
        runner: Arc<dyn TaskRunner + 'static>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let rx = Arc::new(Mutex::new(rx));
        let submitter = Submitter {
            tx,
            tracker: tracker.clone(),
        };

        let workers = (0..workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    rx.clone(),
                    shutdown_tx.subscribe(),
                    submitter.clone(),
                    tracker.clone(),
                    runner.clone(),
                ))
            })
            .collect();

        Self {
            submitter,
            shutdown_tx,
            workers,
        }
    }

    pub fn submit(&self, task: Task) {
        self.submitter.submit(task);
    }

    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for worker in self.workers {
            if let Err(err) = worker.await {
                error!("worker panicked: {err}");
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Task>>>,
    mut shutdown: watch::Receiver<bool>,
    submitter: Submitter,
    tracker: Arc<CompletionTracker>,
    runner: Arc<dyn TaskRunner + 'static>,
) {
    loop {
        let task = tokio::select! {
            _ = shutdown.changed() => break,
            task = async { queue.lock().await.recv().await } => match task {
                Some(task) => task,
                None => break,
            },
        };

        tracker.on_start();
        runner.run_task(task, &submitter).await;
        tracker.on_finish();
    }
    debug!("worker {id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // Fans out `width` children per task until `max_depth`, purely in memory.
    struct FanOut {
        width: usize,
        max_depth: usize,
        executed: AtomicUsize,
    }

    #[async_trait]
    impl TaskRunner for FanOut {
        async fn run_task(&self, task: Task, submitter: &Submitter) {
            self.executed.fetch_add(1, Ordering::Relaxed);
            if task.depth + 1 >= self.max_depth {
                return;
            }
            for i in 0..self.width {
                submitter.submit(Task {
                    url: format!("{}/{i}", task.url),
                    depth: task.depth + 1,
                });
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reentrant_submission_drains_completely() {
        let tracker = Arc::new(CompletionTracker::new());
        let runner = Arc::new(FanOut {
            width: 3,
            max_depth: 4,
            executed: AtomicUsize::new(0),
        });
        let pool = WorkerPool::start(4, tracker.clone(), runner.clone());

        pool.submit(Task {
            url: "root".to_string(),
            depth: 0,
        });

        tokio::time::timeout(Duration::from_secs(5), tracker.wait_idle())
            .await
            .expect("self-expanding job graph should drain");
        pool.shutdown().await;

        // 1 + 3 + 9 + 27 tasks over four levels.
        assert_eq!(runner.executed.load(Ordering::Relaxed), 40);
        assert_eq!(tracker.pending(), 0);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let tracker = Arc::new(CompletionTracker::new());
        let runner = Arc::new(FanOut {
            width: 0,
            max_depth: 1,
            executed: AtomicUsize::new(0),
        });
        let pool = WorkerPool::start(2, tracker.clone(), runner);

        tokio::time::timeout(Duration::from_secs(1), pool.shutdown())
            .await
            .expect("idle workers should stop promptly");
    }
}

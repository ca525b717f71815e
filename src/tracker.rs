use parking_lot::Mutex;
use tokio::sync::watch;

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    pending: usize,
    in_flight: usize,
}

// Tracks submitted-but-unstarted and started-but-unfinished tasks. The run is
// drained exactly when both counts are zero after a finish; both counts live
// under one lock, and the terminal check happens inside the same critical
// section as the decrement. Invariant relied on by the pool: a task submits
// all of its children before its own finish is recorded.
pub struct CompletionTracker {
    counts: Mutex<Counts>,
    idle_tx: watch::Sender<bool>,
    // Held so the channel stays open while nobody is waiting yet.
    idle_rx: watch::Receiver<bool>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        let (idle_tx, idle_rx) = watch::channel(true);
        Self {
            counts: Mutex::new(Counts::default()),
            idle_tx,
            idle_rx,
        }
    }

    pub fn on_submit(&self) {
        let mut counts = self.counts.lock();
        counts.pending += 1;
        let _ = self.idle_tx.send(false);
    }

    pub fn on_start(&self) {
        let mut counts = self.counts.lock();
        counts.pending -= 1;
        counts.in_flight += 1;
    }

    pub fn on_finish(&self) {
        let mut counts = self.counts.lock();
        counts.in_flight -= 1;
        if counts.pending == 0 && counts.in_flight == 0 {
            let _ = self.idle_tx.send(true);
        }
    }

    // Compensation path for a submission that never reached the queue.
    pub fn on_discard(&self) {
        let mut counts = self.counts.lock();
        counts.pending -= 1;
        if counts.pending == 0 && counts.in_flight == 0 {
            let _ = self.idle_tx.send(true);
        }
    }

    pub async fn wait_idle(&self) {
        let mut idle_rx = self.idle_rx.clone();
        let _ = idle_rx.wait_for(|idle| *idle).await;
    }

    pub fn pending(&self) -> usize {
        self.counts.lock().pending
    }

    pub fn in_flight(&self) -> usize {
        self.counts.lock().in_flight
    }
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

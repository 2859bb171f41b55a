//! Bridge between background requests and a single-threaded UI loop.
//!
//! Futures run on the tokio runtime; their completion callbacks are queued
//! and only executed when the UI loop drains its [`UiQueue`].

use std::future::Future;

use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tracing::debug;

type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Sending half, cloned into every component that reports to the UI.
#[derive(Clone)]
pub struct UiDispatcher {
    runtime: Handle,
    tx: mpsc::UnboundedSender<UiTask>,
}

/// Receiving half owned by the UI loop.
pub struct UiQueue {
    rx: mpsc::UnboundedReceiver<UiTask>,
}

impl UiDispatcher {
    /// Dispatcher spawning onto `runtime`, plus the queue it delivers to.
    pub fn new(runtime: Handle) -> (Self, UiQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { runtime, tx }, UiQueue { rx })
    }

    /// Run `future` in the background and queue `callback` with its output.
    pub fn dispatch<F, C>(&self, future: F, callback: C) -> JoinHandle<()>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        C: FnOnce(F::Output) + Send + 'static,
    {
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let output = future.await;
            if tx.send(Box::new(move || callback(output))).is_err() {
                debug!("ui queue closed; dropping completion");
            }
        })
    }

    /// Queue `task` for the UI loop. Returns `false` once the queue is gone.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(task)).is_ok()
    }
}

impl UiQueue {
    /// Run every callback queued so far without waiting; returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait for the next callback and run it. `false` once every dispatcher is dropped.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run callbacks until every dispatcher is dropped.
    pub async fn run(mut self) {
        while self.run_next().await {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test]
    async fn callbacks_wait_for_the_ui_loop() {
        let (dispatcher, mut queue) = UiDispatcher::new(Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        dispatcher
            .dispatch(async { 21 * 2 }, move |value| sink.lock().unwrap().push(value))
            .await
            .unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![42]);
        assert_eq!(queue.run_pending(), 0);
    }

    #[tokio::test]
    async fn run_stops_when_dispatchers_drop() {
        let (dispatcher, queue) = UiDispatcher::new(Handle::current());
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            assert!(dispatcher.post(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        drop(dispatcher);

        queue.run().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}

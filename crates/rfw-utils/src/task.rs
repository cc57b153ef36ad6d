use futures::channel::oneshot;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use threadpool::ThreadPool;

/// Shared pool of worker threads. Cloning is cheap and shares the workers.
#[derive(Debug, Clone)]
pub struct TaskPool {
    executor: Arc<Mutex<ThreadPool>>,
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl TaskPool {
    pub fn new(nr_threads: usize) -> Self {
        Self {
            executor: Arc::new(Mutex::new(ThreadPool::new(nr_threads.max(1)))),
        }
    }

    /// Runs `job` on a worker thread. The returned [`Signal`] resolves to the value the job
    /// hands to its [`Finish`], or to `None` if the job drops it without sending (including
    /// when the job panics).
    pub fn push<F, T>(&self, job: F) -> Signal<T>
    where
        F: FnOnce(Finish<T>) + Send + 'static,
        T: Send + 'static,
    {
        let (finish, signal) = Finish::new();
        match self.executor.lock() {
            Ok(executor) => executor.execute(move || job(finish)),
            // A poisoned pool cannot accept work; dropping `finish` resolves the signal to None.
            Err(_) => drop(finish),
        }
        signal
    }

    pub fn active_count(&self) -> usize {
        self.executor.lock().map(|e| e.active_count()).unwrap_or(0)
    }

    pub fn queued_count(&self) -> usize {
        self.executor.lock().map(|e| e.queued_count()).unwrap_or(0)
    }

    /// Blocks until every queued and running job has finished.
    pub fn join(&self) {
        let executor = match self.executor.lock() {
            Ok(executor) => executor.clone(),
            Err(_) => return,
        };
        executor.join();
    }
}

/// Sending half handed to a job.
#[derive(Debug)]
pub struct Finish<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Finish<T> {
    pub fn new() -> (Self, Signal<T>) {
        let (sender, receiver) = oneshot::channel();
        (Finish { sender }, Signal { receiver })
    }

    pub fn send(self, val: T) {
        // Nobody is listening anymore; the value is simply dropped.
        let _ = self.sender.send(val);
    }

    /// True once the matching [`Signal`] has been dropped.
    pub fn is_canceled(&self) -> bool {
        self.sender.is_canceled()
    }
}

/// Receiving half of a job, resolves once the job finishes.
#[derive(Debug)]
pub struct Signal<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Signal<T> {
    /// Blocks the current thread until the job is done.
    pub fn join(self) -> Option<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Signal<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

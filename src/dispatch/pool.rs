use crossbeam_channel::unbounded;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// Uniform result of one pool task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Completed(T),
    /// The task hit its deadline. Carries whatever it salvaged.
    TimedOut(T),
    /// The task could not produce a value, or panicked.
    Failed(String),
}

/// A unit of work the pool can run. The task is responsible for honouring
/// the timeout it is handed.
pub trait Task: Send {
    type Key: Eq + Hash + Clone + Send;
    type Output: Send;

    fn key(&self) -> Self::Key;
    fn run(self, timeout: Duration) -> TaskOutcome<Self::Output>;
}

/// Fixed number of worker threads pulling from one shared queue.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    timeout: Duration,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl WorkerPool {
    pub fn new(workers: usize, timeout: Duration) -> Self {
        WorkerPool {
            workers: workers.max(1),
            timeout,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs every task and blocks until all of them finished. `on_complete`
    /// is called from the worker thread as each task finishes, in completion
    /// order.
    pub fn run<T, F>(&self, tasks: Vec<T>, on_complete: F) -> FxHashMap<T::Key, TaskOutcome<T::Output>>
    where
        T: Task,
        F: Fn(&T::Key, &TaskOutcome<T::Output>) + Sync,
    {
        let total = tasks.len();
        let (sender, receiver) = unbounded();
        for task in tasks {
            // The receiver is alive until the scope below ends.
            let _ = sender.send(task);
        }
        drop(sender);

        let results = Mutex::new(FxHashMap::default());
        let workers = self.workers.min(total);
        debug!(tasks = total, workers, "starting worker pool");

        thread::scope(|scope| {
            for worker in 0..workers {
                let receiver = receiver.clone();
                let results = &results;
                let on_complete = &on_complete;
                let timeout = self.timeout;
                scope.spawn(move || {
                    for task in receiver.iter() {
                        let key = task.key();
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(timeout)))
                            .unwrap_or_else(|payload| {
                                let message = panic_message(payload);
                                error!(worker, %message, "task panicked");
                                TaskOutcome::Failed(message)
                            });
                        on_complete(&key, &outcome);
                        lock(results).insert(key, outcome);
                    }
                });
            }
        });

        results.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    struct Sleep {
        id: usize,
        millis: u64,
    }

    impl Task for Sleep {
        type Key = usize;
        type Output = usize;

        fn key(&self) -> usize {
            self.id
        }

        fn run(self, timeout: Duration) -> TaskOutcome<usize> {
            let wanted = Duration::from_millis(self.millis);
            if wanted > timeout {
                thread::sleep(timeout);
                TaskOutcome::TimedOut(self.id)
            } else {
                thread::sleep(wanted);
                TaskOutcome::Completed(self.id * 10)
            }
        }
    }

    struct Explode;

    impl Task for Explode {
        type Key = &'static str;
        type Output = ();

        fn key(&self) -> &'static str {
            "boom"
        }

        fn run(self, _: Duration) -> TaskOutcome<()> {
            panic!("solver wrapper exploded");
        }
    }

    #[test]
    fn every_task_gets_an_outcome() {
        let pool = WorkerPool::new(4, Duration::from_millis(50));
        let tasks: Vec<Sleep> = (0..12)
            .map(|id| Sleep {
                id,
                millis: if id % 3 == 0 { 1_000 } else { 5 },
            })
            .collect();
        let seen = AtomicUsize::new(0);
        let results = pool.run(tasks, |_, _| {
            seen.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(results.len(), 12);
        assert_eq!(seen.load(Ordering::Relaxed), 12);
        assert_eq!(results[&3], TaskOutcome::TimedOut(3));
        assert_eq!(results[&4], TaskOutcome::Completed(40));
    }

    #[test]
    fn concurrency_is_bounded_by_worker_count() {
        let pool = WorkerPool::new(3, Duration::from_secs(5));
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        struct Gauge<'a> {
            id: usize,
            running: &'a AtomicUsize,
            peak: &'a AtomicUsize,
        }

        impl Task for Gauge<'_> {
            type Key = usize;
            type Output = ();

            fn key(&self) -> usize {
                self.id
            }

            fn run(self, _: Duration) -> TaskOutcome<()> {
                let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                self.running.fetch_sub(1, Ordering::SeqCst);
                TaskOutcome::Completed(())
            }
        }

        let tasks: Vec<Gauge> = (0..10)
            .map(|id| Gauge {
                id,
                running: &running,
                peak: &peak,
            })
            .collect();
        let start = Instant::now();
        let results = pool.run(tasks, |_, _| {});
        assert_eq!(results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn panicking_task_is_reported_as_failed() {
        let pool = WorkerPool::new(2, Duration::from_secs(1));
        let results = pool.run(vec![Explode], |_, _| {});
        assert_eq!(
            results["boom"],
            TaskOutcome::Failed("solver wrapper exploded".to_string())
        );
    }
}

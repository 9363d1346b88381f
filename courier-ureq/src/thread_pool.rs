use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc, Mutex},
    thread,
};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named worker threads fed from one shared queue.
pub struct ThreadPool {
    // JoinHandles kept to prevent threads from being detached immediately.
    // Not read directly - threads exit on their own once the sender is dropped.
    #[allow(dead_code)]
    workers: Vec<thread::JoinHandle<()>>,
    sender: Option<mpsc::Sender<Task>>,
}

impl ThreadPool {
    pub fn new(size: usize, name: &str) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let rx = Arc::clone(&rx);
            let worker = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || worker_loop(rx))?;
            workers.push(worker);
        }
        Ok(ThreadPool {
            workers,
            sender: Some(tx),
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sender) = &self.sender {
            if sender.send(Box::new(f)).is_err() {
                log::warn!("worker pool is gone, task dropped");
            }
        }
    }
}

fn worker_loop(rx: Arc<Mutex<mpsc::Receiver<Task>>>) {
    loop {
        let task = match rx.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok(task) = task else { break };

        // A panicking callback must not take the worker down with it.
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            log::error!(
                "task panicked on worker {}",
                thread::current().name().unwrap_or("<unnamed>")
            );
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Drop the sender so workers leave their recv() loop once the queue is
        // drained. Not joined: queued requests still complete and deliver.
        self.sender.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[test]
    fn tasks_run_in_parallel() {
        let (results_tx, results_rx) = mpsc::channel::<u32>();

        let pool = ThreadPool::new(4, "test").unwrap();
        assert_eq!(pool.size(), 4);

        let start = Instant::now();
        for i in 0..4u32 {
            let tx = results_tx.clone();
            pool.execute(move || {
                std::thread::sleep(Duration::from_millis(100));
                let _ = tx.send(i);
            });
        }
        drop(results_tx);

        let mut results: Vec<u32> = results_rx.iter().collect();
        results.sort();
        assert_eq!(results, vec![0, 1, 2, 3]);

        // Sequential execution would take 400ms.
        assert!(
            start.elapsed() < Duration::from_millis(350),
            "took {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn worker_survives_a_panicking_task() {
        let pool = ThreadPool::new(1, "test").unwrap();
        let (tx, rx) = mpsc::channel();

        pool.execute(|| panic!("boom"));
        pool.execute(move || {
            let _ = tx.send(thread::current().name().map(str::to_string));
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("test-0"));
    }

    #[test]
    fn queued_tasks_finish_after_drop() {
        let pool = ThreadPool::new(2, "test").unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..6 {
            let tx = tx.clone();
            pool.execute(move || {
                std::thread::sleep(Duration::from_millis(10));
                let _ = tx.send(i);
            });
        }
        drop(tx);
        drop(pool);

        assert_eq!(rx.iter().count(), 6);
    }
}

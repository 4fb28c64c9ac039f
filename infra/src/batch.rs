use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Buffers items up to `batch_size`, or until `flush_interval` elapses,
/// then hands the accumulated batch to `flush_fn`. A background task
/// re-arms the timer after every flush; `close` cancels it and issues one
/// final flush so nothing buffered is lost.
pub struct BatchExecutor<T: Send + 'static> {
    inner: Arc<Inner<T>>,
    shutdown: Arc<AtomicBool>,
    timer: Option<tokio::task::JoinHandle<()>>,
}

struct Inner<T> {
    items: Mutex<Vec<T>>,
    batch_size: usize,
    flush_fn: Box<dyn Fn(Vec<T>) + Send + Sync>,
}

impl<T> Inner<T> {
    fn flush(&self) {
        let batch = {
            let mut items = self.items.lock().unwrap();
            if items.is_empty() {
                return;
            }
            std::mem::take(&mut *items)
        };
        (self.flush_fn)(batch);
    }
}

impl<T: Send + 'static> BatchExecutor<T> {
    pub fn new(
        batch_size: usize,
        flush_interval: Duration,
        flush_fn: impl Fn(Vec<T>) + Send + Sync + 'static,
    ) -> Self {
        let inner = Arc::new(Inner {
            items: Mutex::new(Vec::new()),
            batch_size,
            flush_fn: Box::new(flush_fn),
        });
        let shutdown = Arc::new(AtomicBool::new(false));
        let timer_inner = inner.clone();
        let timer_shutdown = shutdown.clone();
        let timer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(flush_interval).await;
                if timer_shutdown.load(Ordering::Acquire) {
                    break;
                }
                timer_inner.flush();
            }
        });
        Self {
            inner,
            shutdown,
            timer: Some(timer),
        }
    }

    /// Buffers `item`; flushes immediately if this push crosses `batch_size`.
    pub fn add(&self, item: T) {
        let batch = {
            let mut items = self.inner.items.lock().unwrap();
            items.push(item);
            if items.len() < self.inner.batch_size {
                return;
            }
            std::mem::take(&mut *items)
        };
        (self.inner.flush_fn)(batch);
    }

    pub async fn close(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.inner.flush();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn add_flushes_once_batch_size_is_reached() {
        let flushed = Arc::new(AtomicUsize::new(0));
        let counter = flushed.clone();
        let executor = BatchExecutor::new(2, Duration::from_secs(60), move |batch| {
            counter.fetch_add(batch.len(), Ordering::SeqCst);
        });
        executor.add(1);
        assert_eq!(flushed.load(Ordering::SeqCst), 0);
        executor.add(2);
        assert_eq!(flushed.load(Ordering::SeqCst), 2);
        executor.close().await;
    }

    #[tokio::test]
    async fn close_flushes_remaining_items() {
        let flushed = Arc::new(AtomicUsize::new(0));
        let counter = flushed.clone();
        let executor = BatchExecutor::new(100, Duration::from_secs(60), move |batch| {
            counter.fetch_add(batch.len(), Ordering::SeqCst);
        });
        executor.add(1);
        executor.add(2);
        executor.close().await;
        assert_eq!(flushed.load(Ordering::SeqCst), 2);
    }
}

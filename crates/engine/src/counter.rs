use std::sync::atomic::{AtomicU64, Ordering};

/// Number of scoring calls that completed and were measured.
///
/// Shared by handle (`Arc<CompletionCounter>`) between the controller and
/// every worker. Only ever grows.
#[derive(Debug, Default)]
pub struct CompletionCounter {
    count: AtomicU64,
}

impl CompletionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Current count as a real number, the unit the throttle works in.
    ///
    /// Relaxed: the throttle only needs a recent value, not the latest.
    pub fn value(&self) -> f64 {
        self.get() as f64
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_at_zero() {
        let counter = CompletionCounter::new();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.value(), 0.0);
    }

    #[test]
    fn no_lost_updates_across_threads() {
        let counter = CompletionCounter::new();
        let threads = 16;
        let per_thread = 10_000;

        std::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    for _ in 0..per_thread {
                        counter.increment();
                    }
                });
            }
            // A concurrent reader only ever sees a non-decreasing count.
            s.spawn(|| {
                let mut last = 0.0;
                for _ in 0..1_000 {
                    let now = counter.value();
                    assert!(now >= last);
                    last = now;
                }
            });
        });

        assert_eq!(counter.get(), (threads * per_thread) as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn no_lost_updates_across_tasks() {
        let counter = Arc::new(CompletionCounter::new());
        let handles: Vec<_> = (0..10_000)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move { counter.increment() })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(counter.get(), 10_000);
    }
}

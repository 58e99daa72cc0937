//! Helpers shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::Level;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Counts events of one level emitted while installed.
#[derive(Clone)]
pub struct LevelCounter {
    level: Level,
    count: Arc<AtomicUsize>,
}

impl LevelCounter {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == self.level {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

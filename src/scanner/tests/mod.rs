//! Commit runner tests with a fake scan target and trivial scanner binaries


use crate::scanner::target::ScanTarget;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Scan target whose answer is set by the test
#[derive(Default)]
pub struct FakeTarget {
    exists: AtomicBool,
    lookups: AtomicUsize,
}

impl FakeTarget {
    pub fn existing() -> Self {
        let target = Self::default();
        target.exists.store(true, Ordering::SeqCst);
        target
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanTarget for FakeTarget {
    async fn component_exists(&self, _component_key: &str) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.exists.load(Ordering::SeqCst)
    }
}

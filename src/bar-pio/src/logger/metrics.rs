// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Metric primitives.
//!
//! Counters exhibit interior mutability and are `Sync`, so subsystems can
//! update them through a global non-mut static. Serialization flushes the
//! delta since the previous flush and resets it, so periodic serialization of
//! the aggregate metrics struct yields per-interval counts.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Serialize, Serializer};

/// Used for defining new types of metrics that act as a counter (i.e they are
/// continuously updated by incrementing their value).
pub trait IncMetric {
    /// Adds `value` to the current counter.
    fn add(&self, value: u64);
    /// Increments by 1 unit the current counter.
    fn inc(&self) {
        self.add(1);
    }
    /// Returns current value of the counter.
    fn count(&self) -> u64;
}

/// Counter that may be incremented from more than one thread.
///
/// Keeps two values: the live count and the count at the last flush, so a
/// flush can emit the delta without a racy reset of the live value.
#[derive(Debug, Default)]
pub struct SharedIncMetric(AtomicU64, AtomicU64);

impl SharedIncMetric {
    /// Const default construction.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0), AtomicU64::new(0))
    }
}

impl IncMetric for SharedIncMetric {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Serialize for SharedIncMetric {
    /// Serializes the delta since the previous flush and, on success, resets
    /// it. Any print of the metrics will also reset them.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let snapshot = self.0.load(Ordering::Relaxed);
        let res = serializer.serialize_u64(snapshot - self.1.load(Ordering::Relaxed));

        if res.is_ok() {
            self.1.store(snapshot, Ordering::Relaxed);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_inc_metric() {
        let metric = SharedIncMetric::new();
        metric.inc();
        metric.add(4);
        assert_eq!(metric.count(), 5);
    }

    #[test]
    fn test_serialize_resets_delta() {
        let metric = SharedIncMetric::new();
        metric.add(3);
        assert_eq!(serde_json::to_string(&metric).unwrap(), "3");
        // The live count is untouched, the flushed delta is reset.
        assert_eq!(metric.count(), 3);
        assert_eq!(serde_json::to_string(&metric).unwrap(), "0");
        metric.inc();
        assert_eq!(serde_json::to_string(&metric).unwrap(), "1");
    }
}

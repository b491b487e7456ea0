// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Logging and metrics plumbing.
//!
//! Logging goes through the `log` facade; the embedding application decides
//! where records end up. The data path itself logs only
//! fatal-integration-bug conditions — best-effort packet loss is counted in
//! metrics, never logged.

mod metrics;

pub use log::{Level, debug, error, info, trace, warn};

pub use self::metrics::{IncMetric, SharedIncMetric};

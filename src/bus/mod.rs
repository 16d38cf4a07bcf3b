// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Consumer-group reader.
pub mod consumer;
/// Idempotent JSON producer.
pub mod producer;

pub use consumer::{BusConsumer, OffsetReset};
pub use producer::BusProducer;

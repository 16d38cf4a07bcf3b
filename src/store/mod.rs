// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Bulk HTTP client with index rollover and the known-index memo.
pub mod client;
/// Size/time buffered batching in front of the bulk API.
pub mod writer;

pub use client::StoreClient;
pub use writer::BulkWriter;

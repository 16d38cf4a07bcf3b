// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// RFC 5424 / RFC 3164 grammars with graceful degradation.
pub mod parser;

pub use parser::{GrammarError, parse, try_parse};

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Predicate operators and the condition tree.
pub mod condition;
/// The rule set, its mutation operations, and evaluation.
pub mod engine;

pub use condition::{Condition, Evaluate};
pub use engine::{AlertRule, RuleEngine, RuleMatch, default_rules};

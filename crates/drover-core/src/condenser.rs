// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::view::View;

/// What a condenser decided to do with the view it was given.
#[derive(Debug, Clone)]
pub enum CondenserOutcome {
    /// Use this view as-is for the next model request.
    View(View),
    /// Append a condensation event, then recompute the view from the log.
    Condensation {
        forgotten_event_ids: Vec<String>,
        summary: Option<String>,
        summary_offset: Option<usize>,
    },
}

/// History condensation hook, called once per step before projection.
///
/// The algorithm is pluggable; the engine only reacts to the outcome.  A
/// condenser never mutates the log — forgetting happens in the view.
pub trait Condenser: Send + Sync {
    fn condense(&self, view: View) -> CondenserOutcome;
}

/// Identity condenser: returns the view unchanged.  The default.
#[derive(Debug, Default)]
pub struct NoopCondenser;

impl Condenser for NoopCondenser {
    fn condense(&self, view: View) -> CondenserOutcome {
        CondenserOutcome::View(view)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

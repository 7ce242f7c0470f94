// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashSet;

use crate::event::{Event, EventKind};

/// A derived, read-only projection of the event log after condensation.
///
/// Equal to the log when no condensation event is present.  Otherwise the
/// forgotten events are removed and, when the most recent condensation
/// carries a summary, a synthetic environment message holding that summary is
/// spliced in at its offset.  Views are recomputed on demand and never
/// stored; the log itself is untouched.
#[derive(Debug, Clone)]
pub struct View {
    events: Vec<Event>,
}

impl View {
    pub fn from_events(log: &[Event]) -> Self {
        let mut forgotten: HashSet<&str> = HashSet::new();
        let mut summary: Option<(&str, usize)> = None;
        for event in log {
            if let EventKind::Condensation {
                forgotten_event_ids,
                summary: s,
                summary_offset,
            } = &event.kind
            {
                forgotten.extend(forgotten_event_ids.iter().map(String::as_str));
                if let Some(text) = s {
                    summary = Some((text.as_str(), summary_offset.unwrap_or(0)));
                }
            }
        }

        let mut events: Vec<Event> = log
            .iter()
            .filter(|e| !e.is_condensation() && !forgotten.contains(e.id.as_str()))
            .cloned()
            .collect();

        if let Some((text, offset)) = summary {
            let offset = offset.min(events.len());
            events.insert(offset, Event::environment_message(text));
        }

        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use drover_model::ContentPart;

    fn msg(text: &str) -> Event {
        Event::user_message(vec![ContentPart::text(text)], vec![])
    }

    #[test]
    fn view_equals_log_without_condensation() {
        let log = vec![msg("a"), msg("b")];
        let view = View::from_events(&log);
        assert_eq!(view.len(), 2);
        assert_eq!(view.events()[0].id, log[0].id);
    }

    #[test]
    fn forgotten_events_are_removed_from_view_only() {
        let log = vec![msg("a"), msg("b"), msg("c")];
        let forget = vec![log[1].id.clone()];
        let mut full = log.clone();
        full.push(Event::condensation(forget, None, None));

        let view = View::from_events(&full);
        assert_eq!(view.len(), 2);
        assert!(view.events().iter().all(|e| e.id != log[1].id));
        // The log itself is untouched.
        assert_eq!(full.len(), 4);
    }

    #[test]
    fn summary_is_spliced_at_offset() {
        let log = vec![msg("a"), msg("b")];
        let mut full = log.clone();
        full.push(Event::condensation(
            vec![log[0].id.clone()],
            Some("earlier: greeting".into()),
            Some(0),
        ));

        let view = View::from_events(&full);
        assert_eq!(view.len(), 2);
        match &view.events()[0].kind {
            EventKind::Message { content, .. } => {
                assert_eq!(content[0], ContentPart::text("earlier: greeting"));
            }
            other => panic!("expected synthetic message, got {other:?}"),
        }
        assert_eq!(view.events()[1].id, log[1].id);
    }

    #[test]
    fn summary_offset_is_clamped_to_view_length() {
        let full = vec![msg("a"), Event::condensation(vec![], Some("s".into()), Some(99))];
        let view = View::from_events(&full);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn later_condensation_summary_wins() {
        let full = vec![
            msg("a"),
            Event::condensation(vec![], Some("old".into()), Some(0)),
            Event::condensation(vec![], Some("new".into()), Some(0)),
        ];
        let view = View::from_events(&full);
        match &view.events()[0].kind {
            EventKind::Message { content, .. } => {
                assert_eq!(content[0], ContentPart::text("new"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn forgotten_ids_accumulate_across_condensations() {
        let log = vec![msg("a"), msg("b"), msg("c")];
        let mut full = log.clone();
        full.push(Event::condensation(vec![log[0].id.clone()], None, None));
        full.push(Event::condensation(vec![log[2].id.clone()], None, None));
        let view = View::from_events(&full);
        assert_eq!(view.len(), 1);
        assert_eq!(view.events()[0].id, log[1].id);
    }
}

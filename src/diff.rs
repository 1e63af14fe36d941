//! Field-level changes between consecutive metadata snapshots.

use std::{collections::BTreeSet, collections::VecDeque, fmt};

use crate::metadata::{FieldIndex, MetadataSnapshot};

/// A single field that changed value between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub row: usize,
    pub column: usize,
    pub previous: u16,
    pub current: u16,
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "meta[{},{}] changed from 0x{:04x}={} to 0x{:04x}={}",
            self.row, self.column, self.previous, self.previous, self.current, self.current
        )
    }
}

/// Compare `current` against `previous`, skipping fields in
/// `ignore`.
///
/// Only fields present in both snapshots take part, so a
/// layout change never produces events for the slots that
/// appeared or vanished. Events come out in row-major order.
pub fn diff(
    previous: Option<&MetadataSnapshot>,
    current: &MetadataSnapshot,
    ignore: &BTreeSet<FieldIndex>,
) -> Vec<ChangeEvent> {
    let previous = match previous {
        Some(p) => p,
        None => return vec![],
    };

    current
        .iter()
        .filter(|(idx, _)| !ignore.contains(idx))
        .filter_map(|((row, column), value)| {
            let before = previous.get((row, column))?;
            (before != value).then(|| ChangeEvent {
                row,
                column,
                previous: before,
                current: value,
            })
        })
        .collect()
}

/// Bounded history of change events, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ChangeHistory {
    capacity: usize,
    events: VecDeque<ChangeEvent>,
}

impl ChangeHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ChangeHistory {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, event: ChangeEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn extend<I: IntoIterator<Item = ChangeEvent>>(&mut self, events: I) {
        for e in events {
            self.push(e);
        }
    }

    /// Retained events, newest last.
    pub fn events(&self) -> impl Iterator<Item = &ChangeEvent> + '_ {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::decode;

    fn frame_counters() -> BTreeSet<FieldIndex> {
        vec![(0, 0), (0, 1)].into_iter().collect()
    }

    fn words() -> Vec<u16> {
        (0..72).map(|i| i as u16 * 3).collect()
    }

    #[test]
    fn self_diff_is_empty() {
        let snap = decode(&words(), 24);
        assert!(diff(Some(&snap), &snap, &BTreeSet::new()).is_empty());
        assert!(diff(Some(&snap), &snap, &frame_counters()).is_empty());
    }

    #[test]
    fn first_frame_has_no_changes() {
        let snap = decode(&words(), 24);
        assert!(diff(None, &snap, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn frame_counters_are_ignored() {
        let before = decode(&words(), 24);
        let mut w = words();
        w[0] += 1;
        w[1] += 1;
        let after = decode(&w, 24);
        assert!(diff(Some(&before), &after, &frame_counters()).is_empty());

        w[2 * 24 + 5] = 0xbeef;
        let after = decode(&w, 24);
        let events = diff(Some(&before), &after, &frame_counters());
        assert_eq!(
            events,
            vec![ChangeEvent {
                row: 2,
                column: 5,
                previous: (2 * 24 + 5) * 3,
                current: 0xbeef,
            }]
        );
    }

    #[test]
    fn events_are_row_major() {
        let before = decode(&[0; 6], 3);
        let after = decode(&[0, 0, 7, 1, 0, 0], 3);
        let events = diff(Some(&before), &after, &BTreeSet::new());
        let coords: Vec<_> = events.iter().map(|e| (e.row, e.column)).collect();
        assert_eq!(coords, vec![(0, 2), (1, 0)]);
    }

    #[test]
    fn layout_change_only_diffs_overlap() {
        let before = decode(&[1, 2, 3, 4], 4);
        let after = decode(&[1, 9], 4);
        let events = diff(Some(&before), &after, &BTreeSet::new());
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].row, events[0].column), (0, 1));
    }

    #[test]
    fn event_text() {
        let e = ChangeEvent {
            row: 2,
            column: 5,
            previous: 0x10,
            current: 0xff,
        };
        assert_eq!(e.to_string(), "meta[2,5] changed from 0x0010=16 to 0x00ff=255");
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = ChangeHistory::new(3);
        history.extend((0..5).map(|i| ChangeEvent {
            row: 0,
            column: i,
            previous: 0,
            current: 1,
        }));
        let cols: Vec<_> = history.events().map(|e| e.column).collect();
        assert_eq!(cols, vec![2, 3, 4]);
        assert_eq!(history.len(), 3);
    }
}

//! Branchable move history with a selection cursor.
//!
//! Entry 0 is always the setup root. Every later entry owns the snapshot
//! produced by applying its move to the previous entry's snapshot, so the
//! timeline can be replayed from the root at any time. Entries are never
//! mutated once appended; truncation drops them, which releases their
//! snapshots exactly once.

use crate::games::quoridor::{Move, RulesEngine, Step};
use crate::snapshot::Snapshot;
use derive_getters::Getters;
use tracing::{debug, instrument, warn};

/// Observer called with the index and snapshot of every newly selected entry.
pub type SelectionObserver<E> = Box<dyn FnMut(usize, &Snapshot<E>) + Send>;

/// One recorded position.
#[derive(Debug, Getters)]
pub struct Entry<E: RulesEngine> {
    /// Position in the timeline.
    index: usize,
    /// Setup marker or the move that produced this position.
    step: Step,
    /// Position after `step`.
    snapshot: Snapshot<E>,
}

/// Ordered history of positions and the moves that produced them.
pub struct Timeline<E: RulesEngine> {
    entries: Vec<Entry<E>>,
    cursor: usize,
    observer: Option<SelectionObserver<E>>,
}

impl<E: RulesEngine> Timeline<E> {
    /// Creates a timeline holding only the setup root.
    pub fn new(root: Snapshot<E>) -> Self {
        Self {
            entries: vec![Entry {
                index: 0,
                step: Step::setup(),
                snapshot: root,
            }],
            cursor: 0,
            observer: None,
        }
    }

    /// Number of entries, including the root.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the root entry cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the selected entry.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the selected entry is the latest one.
    pub fn is_at_present(&self) -> bool {
        self.cursor + 1 == self.entries.len()
    }

    /// Entry at `index`, if any.
    pub fn entry(&self, index: usize) -> Option<&Entry<E>> {
        self.entries.get(index)
    }

    /// The selected entry.
    pub fn selected(&self) -> &Entry<E> {
        &self.entries[self.cursor]
    }

    /// The latest entry.
    pub fn latest(&self) -> &Entry<E> {
        &self.entries[self.entries.len() - 1]
    }

    /// All entries in order of play.
    pub fn entries(&self) -> &[Entry<E>] {
        &self.entries
    }

    /// Installs the selection observer, replacing any previous one.
    pub fn on_select(&mut self, observer: impl FnMut(usize, &Snapshot<E>) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Appends the position reached by playing `candidate` from the latest entry.
    ///
    /// Returns the new entry's index, or `None` if the rules engine rejects the
    /// move. A cursor that was on the latest entry follows the new one; a
    /// rewound cursor stays where it is.
    #[instrument(skip(self), fields(len = self.entries.len(), cursor = self.cursor))]
    pub fn append(&mut self, candidate: Move) -> Option<usize> {
        let following = self.is_at_present();
        let Some(snapshot) = self.latest().snapshot.derive(&candidate) else {
            warn!(%candidate, "Timeline rejected illegal move");
            return None;
        };

        let index = self.entries.len();
        self.entries.push(Entry {
            index,
            step: candidate.into(),
            snapshot,
        });
        debug!(index, following, "Appended timeline entry");

        if following {
            self.select(index);
        }
        Some(index)
    }

    /// Moves the cursor and notifies the observer. Out-of-range indices are ignored.
    #[instrument(skip(self), fields(len = self.entries.len()))]
    pub fn select(&mut self, index: usize) -> bool {
        let Some(entry) = self.entries.get(index) else {
            debug!("Selection out of range");
            return false;
        };
        self.cursor = index;
        if let Some(observer) = self.observer.as_mut() {
            observer(index, &entry.snapshot);
        }
        true
    }

    /// Drops every entry after the cursor and returns how many were removed.
    #[instrument(skip(self), fields(len = self.entries.len(), cursor = self.cursor))]
    pub fn truncate_after_cursor(&mut self) -> usize {
        let removed = self.entries.len() - (self.cursor + 1);
        self.entries.truncate(self.cursor + 1);
        if removed > 0 {
            debug!(removed, "Truncated timeline");
        }
        removed
    }

    /// Moves of the entries in `(from, cursor]`, in order.
    pub fn moves_since(&self, from: usize) -> Vec<Move> {
        self.entries
            .iter()
            .take(self.cursor + 1)
            .skip(from + 1)
            .filter_map(|entry| entry.step.as_move())
            .collect()
    }

    /// Discards all history and starts over from a new root.
    #[instrument(skip(self, root), fields(len = self.entries.len()))]
    pub fn reset(&mut self, root: Snapshot<E>) {
        self.entries.clear();
        self.entries.push(Entry {
            index: 0,
            step: Step::setup(),
            snapshot: root,
        });
        self.cursor = 0;
        debug!("Timeline reset to setup");
        self.select(0);
    }

    /// Display labels, one per entry: `"{index}: {label}"`.
    pub fn labels(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| format!("{}: {}", entry.index, entry.step))
            .collect()
    }
}

impl<E: RulesEngine> std::fmt::Debug for Timeline<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("len", &self.entries.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

use serde::{Deserialize, Serialize};

/// One atomic batch of membership changes.
///
/// Subscribers apply `removed` before `added`. Neither list carries positions:
/// the event describes membership, not order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent<T> {
    pub removed: Vec<T>,
    pub added: Vec<T>,
}

impl<T> Default for ChangeEvent<T> {
    fn default() -> Self {
        Self {
            removed: Vec::new(),
            added: Vec::new(),
        }
    }
}

impl<T> ChangeEvent<T> {
    pub fn new(removed: Vec<T>, added: Vec<T>) -> Self {
        Self { removed, added }
    }

    pub fn added(items: impl IntoIterator<Item = T>) -> Self {
        Self::new(Vec::new(), items.into_iter().collect())
    }

    pub fn removed(items: impl IntoIterator<Item = T>) -> Self {
        Self::new(items.into_iter().collect(), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

impl<T: PartialEq> ChangeEvent<T> {
    /// Record an addition made inside a pending batch.
    pub(crate) fn record_added(&mut self, item: T) {
        self.added.push(item);
    }

    /// Record a removal made inside a pending batch.
    ///
    /// Removing something that was added earlier in the same batch cancels
    /// the addition, so the coalesced event still replays against the
    /// contents the batch started from.
    pub(crate) fn record_removed(&mut self, item: T) {
        match self.added.iter().position(|a| *a == item) {
            Some(pos) => {
                self.added.remove(pos);
            }
            None => self.removed.push(item),
        }
    }
}

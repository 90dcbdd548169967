use crate::collection::ChangeEvent;

/// Contents of a collection as reconstructed from its notifications.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShadowList<T> {
    items: Vec<T>,
}

/// What applying one event did to the shadow list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied<T> {
    pub added: usize,
    pub removed: usize,
    /// Removed elements with no matching occurrence in the shadow list.
    pub unmatched: Vec<T>,
}

impl<T: Clone + PartialEq> ShadowList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Replay one event: removals first, then additions.
    ///
    /// Each removed element takes out one matching occurrence. Which one is
    /// unspecified when there are duplicates.
    pub fn apply(&mut self, event: &ChangeEvent<T>) -> Applied<T> {
        let mut applied = Applied {
            added: event.added.len(),
            removed: 0,
            unmatched: Vec::new(),
        };
        for item in &event.removed {
            if self.remove_one(item) {
                applied.removed += 1;
            } else {
                applied.unmatched.push(item.clone());
            }
        }
        self.items.extend(event.added.iter().cloned());
        applied
    }

    fn remove_one(&mut self, item: &T) -> bool {
        match self.items.iter().position(|i| i == item) {
            Some(pos) => {
                // Keeps order intact for sequence comparisons
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

//! In-memory observable list.
//!
//! Every mutating call emits one [`ChangeEvent`] once it has finished, unless
//! it runs inside a [`BatchUpdate`], in which case the changes are coalesced
//! and emitted when the outermost batch ends.
//!
//! Mutation and emission are serialized: a writer holds the emission lock
//! from the moment it changes the list until its subscribers have returned.
//! Callbacks may read the list but must not mutate it.

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{lock, ChangeCallback, ChangeEvent, ChangeSource, ReadCollection, SubscriptionId};
use crate::error::CollectionError;

const WATCH_CAPACITY: usize = 32;

type SharedCallback<T> = Arc<dyn Fn(&ChangeEvent<T>) + Send + Sync>;

struct ListState<T> {
    items: Vec<T>,
    batch_depth: usize,
    pending: ChangeEvent<T>,
}

pub struct ObservableList<T: Clone + PartialEq + Send + Sync + 'static> {
    name: String,
    state: Mutex<ListState<T>>,
    /// Held across mutate + emit; always taken before `state`
    emit_lock: Mutex<()>,
    subscribers: Mutex<HashMap<SubscriptionId, SharedCallback<T>>>,
    update_tx: broadcast::Sender<ChangeEvent<T>>,
    closed: AtomicBool,
}

impl<T> ObservableList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(name: &str) -> Self {
        Self::from_items(name, Vec::new())
    }

    /// Create a list with initial contents. No event is emitted for them.
    pub fn from_items(name: &str, items: impl IntoIterator<Item = T>) -> Self {
        let (update_tx, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            name: name.to_string(),
            state: Mutex::new(ListState {
                items: items.into_iter().collect(),
                batch_depth: 0,
                pending: ChangeEvent::default(),
            }),
            emit_lock: Mutex::new(()),
            subscribers: Mutex::new(HashMap::new()),
            update_tx,
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&self, item: T) {
        self.mutate(|state| {
            state.items.push(item.clone());
            state.pending.record_added(item);
        })
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        self.mutate(|state| {
            for item in items {
                state.items.push(item.clone());
                state.pending.record_added(item);
            }
        })
    }

    /// Remove the first element equal to `item`.
    pub fn remove(&self, item: &T) -> bool {
        self.mutate(|state| match state.items.iter().position(|i| i == item) {
            Some(pos) => {
                let removed = state.items.remove(pos);
                state.pending.record_removed(removed);
                true
            }
            None => false,
        })
    }

    /// Remove every element matching `predicate`. Returns how many were removed.
    pub fn remove_where(&self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        self.mutate(|state| {
            let (removed, kept): (Vec<T>, Vec<T>) =
                mem::take(&mut state.items).into_iter().partition(|i| predicate(i));
            state.items = kept;
            let count = removed.len();
            for item in removed {
                state.pending.record_removed(item);
            }
            count
        })
    }

    pub fn clear(&self) {
        self.mutate(|state| {
            for item in mem::take(&mut state.items) {
                state.pending.record_removed(item);
            }
        })
    }

    /// Swap `old` for `new` in place, reported as a single event.
    pub fn replace(&self, old: &T, new: T) -> bool {
        self.mutate(|state| match state.items.iter().position(|i| i == old) {
            Some(pos) => {
                let previous = mem::replace(&mut state.items[pos], new.clone());
                state.pending.record_removed(previous);
                state.pending.record_added(new);
                true
            }
            None => false,
        })
    }

    /// Start a batch. Changes made until the guard drops are emitted as one event.
    pub fn batch(&self) -> BatchUpdate<'_, T> {
        lock(&self.state).batch_depth += 1;
        BatchUpdate { list: self }
    }

    /// Receive every emitted event over a broadcast channel.
    pub fn watch(&self) -> broadcast::Receiver<ChangeEvent<T>> {
        self.update_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Drop all subscribers and refuse new ones. Mutations keep working.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let dropped = mem::take(&mut *lock(&self.subscribers));
        log::debug!("Closed list '{}', dropped {} subscribers", self.name, dropped.len());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut ListState<T>) -> R) -> R {
        let _emitting = lock(&self.emit_lock);
        let (result, event) = {
            let mut state = lock(&self.state);
            let result = f(&mut state);
            let event = if state.batch_depth == 0 {
                Some(mem::take(&mut state.pending))
            } else {
                None
            };
            (result, event)
        };
        if let Some(event) = event {
            self.emit(event);
        }
        result
    }

    fn end_batch(&self) {
        let _emitting = lock(&self.emit_lock);
        let event = {
            let mut state = lock(&self.state);
            state.batch_depth = state.batch_depth.saturating_sub(1);
            if state.batch_depth == 0 {
                Some(mem::take(&mut state.pending))
            } else {
                None
            }
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// End a batch while the thread is unwinding. Callbacks are skipped so a
    /// second panic cannot abort the process; the coalesced changes are lost
    /// to subscribers.
    fn abandon_batch(&self) {
        let mut state = lock(&self.state);
        state.batch_depth = state.batch_depth.saturating_sub(1);
        if state.batch_depth == 0 {
            let dropped = mem::take(&mut state.pending);
            if !dropped.is_empty() {
                log::warn!(
                    "List '{}': batch abandoned during panic, -{} +{} not delivered",
                    self.name,
                    dropped.removed.len(),
                    dropped.added.len()
                );
            }
        }
    }

    /// Deliver an event. Only the emission lock is held while callbacks run,
    /// so they may read the list.
    fn emit(&self, event: ChangeEvent<T>) {
        if event.is_empty() {
            return;
        }
        log::trace!(
            "List '{}' changed: -{} +{}",
            self.name,
            event.removed.len(),
            event.added.len()
        );

        let callbacks: Vec<SharedCallback<T>> = lock(&self.subscribers).values().cloned().collect();
        for callback in callbacks {
            callback(&event);
        }
        // No receivers is fine
        let _ = self.update_tx.send(event);
    }
}

impl<T> ReadCollection<T> for ObservableList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn snapshot(&self) -> Vec<T> {
        lock(&self.state).items.clone()
    }

    fn len(&self) -> usize {
        lock(&self.state).items.len()
    }
}

impl<T> ChangeSource<T> for ObservableList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscribe(&self, callback: ChangeCallback<T>) -> Result<SubscriptionId, CollectionError> {
        if self.is_closed() {
            return Err(CollectionError::Closed(self.name.clone()));
        }
        let id = Uuid::new_v4();
        lock(&self.subscribers).insert(id, Arc::from(callback));
        log::debug!("Subscribed {} to list '{}'", id, self.name);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = lock(&self.subscribers).remove(&id).is_some();
        if removed {
            log::debug!("Unsubscribed {} from list '{}'", id, self.name);
        }
        removed
    }
}

/// Guard returned by [`ObservableList::batch`].
pub struct BatchUpdate<'a, T: Clone + PartialEq + Send + Sync + 'static> {
    list: &'a ObservableList<T>,
}

impl<'a, T> BatchUpdate<'a, T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn list(&self) -> &'a ObservableList<T> {
        self.list
    }
}

impl<T> Drop for BatchUpdate<'_, T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.list.abandon_batch();
        } else {
            self.list.end_batch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(list: &ObservableList<&'static str>) -> Arc<Mutex<Vec<ChangeEvent<&'static str>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        list.subscribe(Box::new(move |e: &ChangeEvent<&'static str>| {
            sink.lock().unwrap().push(e.clone())
        }))
            .unwrap();
        events
    }

    #[test]
    fn test_single_mutations_emit_one_event_each() {
        let list = ObservableList::from_items("test", ["a"]);
        let events = record(&list);

        list.push("b");
        assert!(list.remove(&"a"));
        assert!(!list.remove(&"missing"));

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![ChangeEvent::added(["b"]), ChangeEvent::removed(["a"])]
        );
        assert_eq!(list.snapshot(), vec!["b"]);
    }

    #[test]
    fn test_batch_coalesces() {
        let list = ObservableList::from_items("test", ["a", "b"]);
        let events = record(&list);

        {
            let batch = list.batch();
            batch.list().push("c");
            batch.list().remove(&"a");
            batch.list().remove(&"c");
            {
                let _inner = list.batch();
                list.push("d");
            }
            assert!(events.lock().unwrap().is_empty());
        }

        let events = events.lock().unwrap();
        assert_eq!(*events, vec![ChangeEvent::new(vec!["a"], vec!["d"])]);
        assert_eq!(list.snapshot(), vec!["b", "d"]);
    }

    #[test]
    fn test_empty_batch_emits_nothing() {
        let list = ObservableList::<&str>::new("test");
        let events = record(&list);
        drop(list.batch());
        list.extend([]);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_remove_where_and_clear() {
        let list = ObservableList::from_items("test", ["a1", "b", "a2"]);
        let events = record(&list);

        assert_eq!(list.remove_where(|s| s.starts_with('a')), 2);
        list.clear();

        let events = events.lock().unwrap();
        assert_eq!(events[0], ChangeEvent::removed(["a1", "a2"]));
        assert_eq!(events[1], ChangeEvent::removed(["b"]));
        assert!(list.is_empty());
    }

    #[test]
    fn test_replace() {
        let list = ObservableList::from_items("test", ["a", "b"]);
        let events = record(&list);

        assert!(list.replace(&"a", "z"));
        assert!(!list.replace(&"q", "z"));

        assert_eq!(list.snapshot(), vec!["z", "b"]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![ChangeEvent::new(vec!["a"], vec!["z"])]
        );
    }

    #[test]
    fn test_callbacks_can_read_list() {
        let list = Arc::new(ObservableList::<u32>::new("test"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let weak = Arc::downgrade(&list);
        let sink = Arc::clone(&seen);
        list.subscribe(Box::new(move |_: &ChangeEvent<u32>| {
            if let Some(list) = weak.upgrade() {
                sink.lock().unwrap().push(list.len());
            }
        }))
        .unwrap();

        list.push(1);
        list.extend([2, 3]);

        assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_unsubscribe_and_close() {
        let list = ObservableList::<u32>::new("test");
        let id = list.subscribe(Box::new(|_: &ChangeEvent<u32>| {})).unwrap();
        assert_eq!(list.subscriber_count(), 1);
        assert!(list.unsubscribe(id));
        assert!(!list.unsubscribe(id));

        list.subscribe(Box::new(|_: &ChangeEvent<u32>| {})).unwrap();
        list.close();
        assert_eq!(list.subscriber_count(), 0);
        assert_eq!(
            list.subscribe(Box::new(|_: &ChangeEvent<u32>| {})),
            Err(CollectionError::Closed("test".into()))
        );
    }

    #[test]
    fn test_batch_unwinding_skips_callbacks() {
        let list = ObservableList::<u32>::new("test");
        let id = list
            .subscribe(Box::new(|_: &ChangeEvent<u32>| panic!("callback ran")))
            .unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _batch = list.batch();
            list.push(1);
            panic!("inside batch");
        }));
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"inside batch"));

        // Batch state was reset: the next change is delivered on its own
        list.unsubscribe(id);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        list.subscribe(Box::new(move |e: &ChangeEvent<u32>| {
            sink.lock().unwrap().push(e.clone())
        }))
        .unwrap();
        list.push(2);

        assert_eq!(*events.lock().unwrap(), vec![ChangeEvent::added([2])]);
        assert_eq!(list.snapshot(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_writers_deliver_in_order() {
        let list = Arc::new(ObservableList::<u32>::new("test"));
        let replayed = Arc::new(Mutex::new(Vec::new()));
        let diverged = Arc::new(Mutex::new(0usize));
        {
            let weak = Arc::downgrade(&list);
            let replayed = Arc::clone(&replayed);
            let diverged = Arc::clone(&diverged);
            list.subscribe(Box::new(move |e: &ChangeEvent<u32>| {
                let Some(list) = weak.upgrade() else { return };
                let mut replayed = replayed.lock().unwrap();
                for r in &e.removed {
                    if let Some(pos) = replayed.iter().position(|x| x == r) {
                        replayed.remove(pos);
                    }
                }
                replayed.extend(e.added.iter().copied());
                let mut live = list.snapshot();
                live.sort_unstable();
                let mut expected = replayed.clone();
                expected.sort_unstable();
                if live != expected {
                    *diverged.lock().unwrap() += 1;
                }
            }))
            .unwrap();
        }

        std::thread::scope(|s| {
            for t in 0..4u32 {
                let list = Arc::clone(&list);
                s.spawn(move || {
                    for i in 0..500 {
                        let v = t * 100_000 + i;
                        list.push(v);
                        list.remove(&v);
                    }
                });
            }
        });

        assert_eq!(*diverged.lock().unwrap(), 0);
        assert!(replayed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watch() {
        let list = ObservableList::from_items("test", [1u32]);
        let mut rx = list.watch();

        list.push(2);
        list.remove(&1);

        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::added([2]));
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::removed([1]));
    }
}

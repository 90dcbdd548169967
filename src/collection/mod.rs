//! Observable collections and the capabilities a verifier needs from them.
//!
//! A collection is observed through two small traits:
//!
//! - [`ReadCollection`]: what is in the collection right now.
//! - [`ChangeSource`]: who gets told when that changes.
//!
//! Anything that implements both is a [`ModelCollection`]. [`ObservableList`]
//! is the in-memory implementation used to drive the verifier.

mod event;
mod observable;
mod subscription;

pub use event::ChangeEvent;
pub use observable::{BatchUpdate, ObservableList};
pub use subscription::Subscription;

use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::error::CollectionError;

pub type SubscriptionId = Uuid;

/// Callback invoked with every non-empty change batch.
pub type ChangeCallback<T> = Box<dyn Fn(&ChangeEvent<T>) + Send + Sync>;

/// Read access to the current contents of a collection.
pub trait ReadCollection<T> {
    /// Current contents, in the collection's own order.
    fn snapshot(&self) -> Vec<T>;

    fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A collection that reports membership changes to subscribers.
///
/// Notifications must be delivered serially: a callback is never entered
/// while another callback for the same collection is still running.
/// The contents seen through [`ReadCollection`] from inside a callback must
/// be the contents right after the reported change.
pub trait ChangeSource<T>: Send + Sync {
    /// Register a callback. Returns a subscription ID.
    fn subscribe(&self, callback: ChangeCallback<T>) -> Result<SubscriptionId, CollectionError>;

    /// Remove a callback. Returns false if the ID was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// A readable collection that reports its own changes.
pub trait ModelCollection<T>: ReadCollection<T> + ChangeSource<T> {}

impl<T, C> ModelCollection<T> for C where C: ReadCollection<T> + ChangeSource<T> + ?Sized {}

/// Lock a mutex, recovering the data if a panicking callback poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

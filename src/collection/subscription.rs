//! Scoped subscriptions.
//!
//! A [`Subscription`] owns one registered callback and removes it when it
//! goes out of scope, so an observer can never outlive the code that set it
//! up. It only keeps a weak reference to the source.

use std::fmt;
use std::sync::Arc;

use super::{ChangeCallback, ChangeSource, SubscriptionId};
use crate::error::CollectionError;

type Release = Box<dyn FnOnce(SubscriptionId) -> bool + Send + Sync>;

pub struct Subscription {
    id: SubscriptionId,
    release: Option<Release>,
}

impl Subscription {
    /// Register `callback` with `source` and tie its lifetime to the returned guard.
    pub fn attach<T, C>(source: &Arc<C>, callback: ChangeCallback<T>) -> Result<Self, CollectionError>
    where
        T: 'static,
        C: ChangeSource<T> + 'static,
    {
        let id = source.subscribe(callback)?;
        let weak = Arc::downgrade(source);
        let release: Release = Box::new(move |id| match weak.upgrade() {
            Some(source) => <C as ChangeSource<T>>::unsubscribe(&source, id),
            // Source is gone and took its subscribers with it
            None => false,
        });
        Ok(Self {
            id,
            release: Some(release),
        })
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Unsubscribe now. Returns true if the source still knew this subscription.
    /// Calling it again is a no-op.
    pub fn release(&mut self) -> bool {
        match self.release.take() {
            Some(release) => {
                log::debug!("Releasing subscription {}", self.id);
                release(self.id)
            }
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{ChangeEvent, ObservableList};

    fn noop() -> ChangeCallback<u32> {
        Box::new(|_: &ChangeEvent<u32>| {})
    }

    #[test]
    fn test_drop_unsubscribes() {
        let list = Arc::new(ObservableList::<u32>::new("test"));
        {
            let subscription = Subscription::attach(&list, noop()).unwrap();
            assert!(subscription.is_active());
            assert_eq!(list.subscriber_count(), 1);
        }
        assert_eq!(list.subscriber_count(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let list = Arc::new(ObservableList::<u32>::new("test"));
        let mut subscription = Subscription::attach(&list, noop()).unwrap();

        assert!(subscription.release());
        assert!(!subscription.is_active());
        assert!(!subscription.release());
        assert_eq!(list.subscriber_count(), 0);
    }

    #[test]
    fn test_outliving_source() {
        let list = Arc::new(ObservableList::<u32>::new("test"));
        let mut subscription = Subscription::attach(&list, noop()).unwrap();
        drop(list);
        assert!(!subscription.release());
    }

    #[test]
    fn test_closed_source() {
        let list = Arc::new(ObservableList::<u32>::new("test"));
        list.close();
        let err = Subscription::attach(&list, noop()).unwrap_err();
        assert_eq!(err, CollectionError::Closed("test".into()));
    }
}

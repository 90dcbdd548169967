//! verifier/mod.rs
//!
//! Checks that a collection's change notifications are consistent with its
//! contents.
//!
//! A [`ChangeVerifier`] takes a snapshot of the collection, subscribes to it
//! and replays every [`ChangeEvent`] onto a private [`ShadowList`]. After each
//! event the shadow list must hold the same elements as the collection. A
//! collection that forgets to report a change, reports one twice, or reports
//! the wrong element is caught at the notification that exposes it.
//!
//! ```ignore
//! let list = Arc::new(ObservableList::from_items("projects", ["a", "b"]));
//! let verifier = ChangeVerifier::new(&list)?;
//!
//! list.push("c");        // replayed and checked
//! verifier.verify()?;    // checked again on demand
//! ```

mod compare;
mod shadow;

pub use compare::{compare, Mismatch};
pub use shadow::{Applied, ShadowList};

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};

use crate::collection::{lock, ChangeCallback, ChangeEvent, ModelCollection, Subscription, SubscriptionId};
use crate::config::{MismatchPolicy, VerifierConfig};
use crate::error::VerifyError;

/// Element types a verifier can track.
pub trait Element: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> Element for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Counters over the lifetime of a verifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifierStats {
    pub events: usize,
    pub added: usize,
    pub removed: usize,
    /// Removals that matched nothing in the shadow list
    pub unmatched: usize,
}

struct VerifierState<T> {
    shadow: ShadowList<T>,
    stats: VerifierStats,
    violations: Vec<Mismatch<T>>,
}

impl<T: Element> VerifierState<T> {
    fn apply(&mut self, event: &ChangeEvent<T>, config: &VerifierConfig) {
        let applied = self.shadow.apply(event);
        self.stats.events += 1;
        self.stats.added += applied.added;
        self.stats.removed += applied.removed;
        self.stats.unmatched += applied.unmatched.len();
        if !applied.unmatched.is_empty() {
            log::warn!(
                "{}: removal of {:?} matched nothing in the replayed contents",
                config.display_name(),
                applied.unmatched
            );
        }
    }

    fn check(&self, live: &[T], config: &VerifierConfig) -> Option<Mismatch<T>> {
        compare(
            self.shadow.as_slice(),
            live,
            config.comparison,
            config.label.as_deref(),
        )
    }
}

/// Replay one event against the shared state and check the result.
fn replay<T, C>(
    state: &Mutex<VerifierState<T>>,
    collection: &C,
    config: &VerifierConfig,
    event: &ChangeEvent<T>,
) -> Option<Mismatch<T>>
where
    T: Element,
    C: ModelCollection<T> + ?Sized,
{
    // Read the collection before taking our own lock
    let live = config.verify_on_change.then(|| collection.snapshot());
    let mut state = lock(state);
    state.apply(event, config);
    let mismatch = state.check(&live?, config)?;
    drop(state);
    log::error!("{}", mismatch);
    Some(mismatch)
}

/// Keeps a shadow copy of a collection in sync with its notifications and
/// checks it against the live contents.
///
/// The verifier is subscribed for as long as it exists. Dropping it, or
/// calling [`detach`](Self::detach), removes the subscription.
pub struct ChangeVerifier<T, C>
where
    T: Element,
    C: ModelCollection<T> + 'static,
{
    collection: Arc<C>,
    state: Arc<Mutex<VerifierState<T>>>,
    config: VerifierConfig,
    subscription: Subscription,
}

impl<T, C> ChangeVerifier<T, C>
where
    T: Element,
    C: ModelCollection<T> + 'static,
{
    /// Snapshot `collection` and start tracking its notifications.
    pub fn new(collection: &Arc<C>) -> Result<Self, VerifyError<T>> {
        Self::with_config(collection, VerifierConfig::default())
    }

    pub fn with_config(collection: &Arc<C>, config: VerifierConfig) -> Result<Self, VerifyError<T>> {
        let state = Arc::new(Mutex::new(VerifierState {
            shadow: ShadowList::new(collection.snapshot()),
            stats: VerifierStats::default(),
            violations: Vec::new(),
        }));

        let callback = Self::callback(Arc::downgrade(collection), Arc::clone(&state), config.clone());
        let subscription = Subscription::attach(collection, callback)?;
        log::debug!(
            "Tracking {} with {} initial elements (subscription {})",
            config.display_name(),
            lock(&state).shadow.len(),
            subscription.id()
        );

        Ok(Self {
            collection: Arc::clone(collection),
            state,
            config,
            subscription,
        })
    }

    /// Like [`with_config`](Self::with_config) for a collection that may
    /// already be gone.
    pub fn from_weak(collection: &Weak<C>, config: VerifierConfig) -> Result<Self, VerifyError<T>> {
        match collection.upgrade() {
            Some(collection) => Self::with_config(&collection, config),
            None => Err(VerifyError::MissingCollection),
        }
    }

    fn callback(
        collection: Weak<C>,
        state: Arc<Mutex<VerifierState<T>>>,
        config: VerifierConfig,
    ) -> ChangeCallback<T> {
        Box::new(move |event: &ChangeEvent<T>| {
            let Some(collection) = collection.upgrade() else {
                return;
            };
            let Some(mismatch) = replay(&state, &*collection, &config, event) else {
                return;
            };
            match config.on_mismatch {
                // State lock is already released here
                MismatchPolicy::Panic => panic!("{}", mismatch),
                MismatchPolicy::Record => lock(&state).violations.push(mismatch),
            }
        })
    }

    /// Replay an event by hand, as if the collection had reported it.
    ///
    /// Returns the mismatch instead of applying the mismatch policy.
    pub fn on_change(&self, event: &ChangeEvent<T>) -> Result<(), VerifyError<T>> {
        match replay(&self.state, &*self.collection, &self.config, event) {
            Some(mismatch) => Err(VerifyError::Mismatch(mismatch)),
            None => Ok(()),
        }
    }

    /// Compare the replayed contents with the live contents.
    pub fn verify(&self) -> Result<(), VerifyError<T>> {
        let live = self.collection.snapshot();
        match lock(&self.state).check(&live, &self.config) {
            Some(mismatch) => {
                log::error!("{}", mismatch);
                Err(VerifyError::Mismatch(mismatch))
            }
            None => Ok(()),
        }
    }

    /// [`verify`](Self::verify), panicking with the report on mismatch.
    pub fn assert_consistent(&self) {
        if let Err(e) = self.verify() {
            panic!("{}", e);
        }
    }

    /// Replayed contents, in replay order.
    pub fn shadow(&self) -> Vec<T> {
        lock(&self.state).shadow.to_vec()
    }

    pub fn stats(&self) -> VerifierStats {
        lock(&self.state).stats
    }

    /// Mismatches kept under [`MismatchPolicy::Record`].
    pub fn violations(&self) -> Vec<Mismatch<T>> {
        lock(&self.state).violations.clone()
    }

    pub fn take_violations(&self) -> Vec<Mismatch<T>> {
        std::mem::take(&mut lock(&self.state).violations)
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn collection(&self) -> &Arc<C> {
        &self.collection
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stop tracking. Later changes are no longer replayed, so `verify` will
    /// report them as a mismatch.
    pub fn detach(&mut self) -> bool {
        self.subscription.release()
    }
}

impl<T, C> fmt::Debug for ChangeVerifier<T, C>
where
    T: Element,
    C: ModelCollection<T> + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeVerifier")
            .field("label", &self.config.display_name())
            .field("subscription", &self.subscription)
            .field("stats", &self.stats())
            .finish()
    }
}

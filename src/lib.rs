// collcheck - consistency checks for observable collections
//
// A collection that raises batched (removed, added) notifications can be
// wrapped in a ChangeVerifier, which replays those notifications onto a
// shadow copy and fails as soon as the shadow copy and the real contents
// disagree.

pub mod collection;
pub mod config;
pub mod error;
pub mod verifier;

pub use collection::{
    BatchUpdate, ChangeCallback, ChangeEvent, ChangeSource, ModelCollection, ObservableList,
    ReadCollection, Subscription, SubscriptionId,
};
pub use config::{ComparisonMode, MismatchPolicy, VerifierConfig};
pub use error::{CollectionError, ConfigError, VerifyError};
pub use verifier::{ChangeVerifier, Element, Mismatch, ShadowList, VerifierStats};

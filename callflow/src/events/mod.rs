//! Application lifecycle events.
//!
//! Each [`crate::Application`] owns one [`LifecycleEvents`] bus. Plugins
//! subscribe at install time and are told when the application starts and
//! stops.

mod lifecycle;
mod subscriptions;

pub use lifecycle::{
    LifecycleEvent, LifecycleEvents, LifecycleHandler, SubscriberFailure, SubscriptionId,
};
pub use subscriptions::SubscriptionSet;

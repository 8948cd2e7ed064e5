//! Installable application features.
//!
//! A plugin adds its own phases and interceptors to an
//! [`ApplicationBuilder`] and may subscribe to lifecycle events. All of its
//! configuration is validated inside [`Plugin::install`], so a bad setting
//! fails at setup instead of on the first call.

mod call_id;
mod call_logging;

pub use call_id::{
    CallId, CallIdConfig, CallIdExtractor, CallIdGenerator, TextGeneratorConfig,
    DEFAULT_CALL_ID_ALPHABET, DEFAULT_CALL_ID_LENGTH,
};
pub use call_logging::{CallLogging, CallLoggingConfig, CallFilter, MdcProvider};

use crate::application::ApplicationBuilder;
use crate::errors::PipelineConfigError;

/// A feature that configures an application at install time.
pub trait Plugin {
    /// Unique key; installing two plugins with the same key is an error.
    fn key(&self) -> &'static str;

    /// Adds the plugin's phases, interceptors and subscriptions to `app`.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin's configuration is invalid or refers
    /// to phases the pipeline does not have.
    fn install(self, app: &mut ApplicationBuilder) -> Result<(), PipelineConfigError>;
}

//! Correlation id resolution.
//!
//! Extractors are tried in registration order and the first non-blank value
//! wins. Only when every extractor misses is the generator consulted. The
//! resolved id is sealed under [`CALL_ID_ATTRIBUTE`] and cannot be
//! replaced or removed afterwards.

use async_trait::async_trait;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use super::Plugin;
use crate::application::ApplicationBuilder;
use crate::context::{CallContext, CALL_ID_ATTRIBUTE};
use crate::errors::{CallResult, CallflowError, PipelineConfigError};
use crate::pipeline::{Interceptor, Next, PipelinePhase};

/// Alphabet used by [`CallIdConfig::generate_default`].
pub const DEFAULT_CALL_ID_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+/";

/// Length used when a generator config omits one.
pub const DEFAULT_CALL_ID_LENGTH: usize = 64;

/// Diagnostic tag carrying the resolved id.
const CALL_ID_TAG: &str = "call_id";

/// Pulls a candidate id out of a call.
pub type CallIdExtractor = Arc<dyn Fn(&CallContext) -> Option<String> + Send + Sync>;

/// Produces an id for a call that brought none.
pub type CallIdGenerator = Arc<dyn Fn(&CallContext) -> Option<String> + Send + Sync>;

/// Parameters of the random text generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextGeneratorConfig {
    /// Number of characters per id.
    #[serde(default = "default_length")]
    pub length: usize,
    /// Characters to draw from; duplicates are ignored.
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
}

fn default_length() -> usize {
    DEFAULT_CALL_ID_LENGTH
}

fn default_alphabet() -> String {
    DEFAULT_CALL_ID_ALPHABET.to_string()
}

impl Default for TextGeneratorConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_CALL_ID_LENGTH,
            alphabet: default_alphabet(),
        }
    }
}

impl TextGeneratorConfig {
    /// Creates a config drawing `length` characters from `alphabet`.
    #[must_use]
    pub fn new(length: usize, alphabet: impl Into<String>) -> Self {
        Self {
            length,
            alphabet: alphabet.into(),
        }
    }

    fn compile(&self) -> Result<TextGenerator, PipelineConfigError> {
        if self.length == 0 {
            return Err(PipelineConfigError::invalid_generator(
                "length must be positive",
            ));
        }

        let mut alphabet: Vec<char> = Vec::new();
        for ch in self.alphabet.chars() {
            if !alphabet.contains(&ch) {
                alphabet.push(ch);
            }
        }
        if alphabet.is_empty() {
            return Err(PipelineConfigError::invalid_generator(
                "alphabet must not be empty",
            ));
        }

        Ok(TextGenerator {
            length: self.length,
            pick: Uniform::from(0..alphabet.len()),
            alphabet,
        })
    }
}

#[derive(Debug)]
struct TextGenerator {
    length: usize,
    alphabet: Vec<char>,
    pick: Uniform<usize>,
}

impl TextGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| self.alphabet[self.pick.sample(&mut rng)])
            .collect()
    }
}

enum GeneratorSpec {
    Custom(CallIdGenerator),
    Text(TextGeneratorConfig),
}

enum Generator {
    Custom(CallIdGenerator),
    Text(TextGenerator),
}

impl Generator {
    fn generate(&self, call: &CallContext) -> Option<String> {
        match self {
            Self::Custom(generate) => generate(call),
            Self::Text(text) => Some(text.generate()),
        }
    }
}

/// How the [`CallId`] plugin finds or makes an id.
#[derive(Default)]
pub struct CallIdConfig {
    extractors: Vec<CallIdExtractor>,
    generator: Option<GeneratorSpec>,
    reply_headers: Vec<String>,
}

impl CallIdConfig {
    /// Creates an empty config; calls resolve no id until something is added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the id from request header `name`.
    #[must_use]
    pub fn header(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.extract(move |call| call.request.header(&name).map(str::to_string))
    }

    /// Adds a custom extractor, tried after those already registered.
    #[must_use]
    pub fn extract<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&CallContext) -> Option<String> + Send + Sync + 'static,
    {
        self.extractors.push(Arc::new(extractor));
        self
    }

    /// Uses `generator` when no extractor produced an id. Replaces any
    /// previously configured generator.
    #[must_use]
    pub fn generate<F>(mut self, generator: F) -> Self
    where
        F: Fn(&CallContext) -> Option<String> + Send + Sync + 'static,
    {
        self.generator = Some(GeneratorSpec::Custom(Arc::new(generator)));
        self
    }

    /// Generates `length` random characters from `alphabet`.
    #[must_use]
    pub fn generate_text(self, length: usize, alphabet: impl Into<String>) -> Self {
        self.generate_with(TextGeneratorConfig::new(length, alphabet))
    }

    /// Generates `length` random characters from [`DEFAULT_CALL_ID_ALPHABET`].
    #[must_use]
    pub fn generate_default(self, length: usize) -> Self {
        self.generate_text(length, DEFAULT_CALL_ID_ALPHABET)
    }

    /// Generates text ids from a loaded generator config.
    #[must_use]
    pub fn generate_with(mut self, config: TextGeneratorConfig) -> Self {
        self.generator = Some(GeneratorSpec::Text(config));
        self
    }

    /// Copies the resolved id into response header `name`.
    #[must_use]
    pub fn reply_to_header(mut self, name: impl Into<String>) -> Self {
        self.reply_headers.push(name.into());
        self
    }
}

impl std::fmt::Debug for CallIdConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallIdConfig")
            .field("extractors", &self.extractors.len())
            .field("generator", &self.generator.is_some())
            .field("reply_headers", &self.reply_headers)
            .finish()
    }
}

/// Resolves a correlation id for every call.
///
/// Installs a `CallId` phase before `Setup`, so everything downstream,
/// logging included, can see the id.
#[derive(Debug, Default)]
pub struct CallId {
    config: CallIdConfig,
}

impl CallId {
    /// The phase the resolver runs in.
    pub const PHASE: PipelinePhase = PipelinePhase::new("CallId");

    /// Creates the plugin from `config`.
    #[must_use]
    pub fn new(config: CallIdConfig) -> Self {
        Self { config }
    }
}

impl Plugin for CallId {
    fn key(&self) -> &'static str {
        "CallId"
    }

    fn install(self, app: &mut ApplicationBuilder) -> Result<(), PipelineConfigError> {
        let CallIdConfig {
            extractors,
            generator,
            reply_headers,
        } = self.config;

        let generator = match generator {
            None => None,
            Some(GeneratorSpec::Custom(generate)) => Some(Generator::Custom(generate)),
            Some(GeneratorSpec::Text(config)) => Some(Generator::Text(config.compile()?)),
        };

        let resolver = CallIdResolver {
            extractors,
            generator,
            reply_headers,
        };

        app.pipeline_mut()
            .insert_phase_before(&PipelinePhase::SETUP, Self::PHASE)?
            .intercept(&Self::PHASE, resolver)?;
        Ok(())
    }
}

struct CallIdResolver {
    extractors: Vec<CallIdExtractor>,
    generator: Option<Generator>,
    reply_headers: Vec<String>,
}

impl CallIdResolver {
    fn resolve(&self, call: &CallContext) -> Option<String> {
        let present = |id: &String| !id.trim().is_empty();

        self.extractors
            .iter()
            .find_map(|extract| extract(call).filter(present))
            .or_else(|| {
                self.generator
                    .as_ref()
                    .and_then(|generator| generator.generate(call))
                    .filter(present)
            })
    }
}

#[async_trait]
impl Interceptor for CallIdResolver {
    async fn intercept(&self, call: &mut CallContext, next: Next<'_>) -> CallResult {
        match self.resolve(call) {
            Some(id) => {
                call.attributes
                    .seal(CALL_ID_ATTRIBUTE, serde_json::Value::String(id.clone()))?;
                call.span().record("call_id", id.as_str());
                call.diagnostics.insert(CALL_ID_TAG.to_string(), id.clone());
                for header in &self.reply_headers {
                    call.response
                        .set_header(header, &id)
                        .map_err(|error| CallflowError::interceptor(CallId::PHASE.name(), error))?;
                }
                debug!(call_id = %id, "Resolved call id");
            }
            None => trace!("No call id resolved"),
        }
        next.proceed(call).await
    }
}

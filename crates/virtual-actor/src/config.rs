//! Configuration for the actor host.
//!
//! Every field has an explicit default, so an empty document is a valid config.
use crate::error::{ActorError, Result};
use crate::identity::DEFAULT_DELIMITER;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_PUBSUB_NAME: &str = "pubsub";
pub const DEFAULT_BUFFER_SIZE: usize = 10;
pub const DEFAULT_BUFFER_TIME_SPAN_MS: u64 = 1000;
pub const DEFAULT_MAX_STACK_DEPTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualActorConfig {
    #[serde(default)]
    pub actor: ActorOptions,

    #[serde(default)]
    pub pubsub: PubSubOptions,

    /// Attach the ambient context to outgoing calls and restore it on incoming ones.
    #[serde(default = "default_true")]
    pub context_propagation: bool,
}

impl Default for VirtualActorConfig {
    fn default() -> Self {
        Self {
            actor: ActorOptions::default(),
            pubsub: PubSubOptions::default(),
            context_propagation: true,
        }
    }
}

impl VirtualActorConfig {
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.actor.validate()?;
        self.pubsub.validate()?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorOptions {
    /// Prepended to every actor id, e.g. a tenant or environment name.
    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Prepended to every actor type name.
    #[serde(default)]
    pub type_name_prefix: String,

    /// Call actors hosted in this process directly instead of through the transport.
    #[serde(default)]
    pub allow_internal_calls: bool,

    #[serde(default)]
    pub reentrancy: ReentrancyOptions,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

impl Default for ActorOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delimiter: default_delimiter(),
            type_name_prefix: String::new(),
            allow_internal_calls: false,
            reentrancy: ReentrancyOptions::default(),
        }
    }
}

impl ActorOptions {
    fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(ActorError::InvalidConfiguration {
                field: "actor.delimiter".into(),
                reason: "must not be empty".into(),
            });
        }
        self.reentrancy.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReentrancyOptions {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,
}

fn default_max_stack_depth() -> usize {
    DEFAULT_MAX_STACK_DEPTH
}

impl Default for ReentrancyOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_stack_depth: default_max_stack_depth(),
        }
    }
}

impl ReentrancyOptions {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_stack_depth == 0 {
            return Err(ActorError::InvalidConfiguration {
                field: "actor.reentrancy.max_stack_depth".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubOptions {
    #[serde(default = "default_pubsub_name")]
    pub default_name: String,

    /// Pending messages that trigger an immediate flush.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default = "default_buffer_time_span_ms")]
    pub buffer_time_span_ms: u64,
}

fn default_pubsub_name() -> String {
    DEFAULT_PUBSUB_NAME.to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_buffer_time_span_ms() -> u64 {
    DEFAULT_BUFFER_TIME_SPAN_MS
}

impl Default for PubSubOptions {
    fn default() -> Self {
        Self {
            default_name: default_pubsub_name(),
            buffer_size: default_buffer_size(),
            buffer_time_span_ms: default_buffer_time_span_ms(),
        }
    }
}

impl PubSubOptions {
    pub fn buffer_time_span(&self) -> Duration {
        Duration::from_millis(self.buffer_time_span_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(ActorError::InvalidConfiguration {
                field: "pubsub.buffer_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.buffer_time_span_ms == 0 {
            return Err(ActorError::InvalidConfiguration {
                field: "pubsub.buffer_time_span_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.default_name.is_empty() {
            return Err(ActorError::InvalidConfiguration {
                field: "pubsub.default_name".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

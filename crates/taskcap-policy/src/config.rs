//! Monitor configuration schema.
//!
//! Every section and field is optional; an empty document yields the
//! defaults.
//!
//! ```toml
//! [capability]
//! malformed_spec = "unrestricted"   # or "fail-closed"
//!
//! [timers]
//! zero_delay = "deferred"           # or "main-queue"
//!
//! [logging]
//! filter = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use taskcap_contracts::{
    domain::DomainId,
    error::{TaskCapError, TaskCapResult},
    CapabilityRules, MalformedSpecPolicy,
};
use taskcap_core::{traits::AccessRecorder, ContextOptions, TaskContext, ZeroDelayRouting};

use crate::engine::CapabilityAccessPolicy;

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitySection {
    /// How a capability string that fails to parse is treated.
    pub malformed_spec: MalformedSpecPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSection {
    pub zero_delay: ZeroDelayRouting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// An `EnvFilter` directive string, e.g. `"taskcap_core=debug,info"`.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub capability: CapabilitySection,
    pub timers: TimerSection,
    pub logging: LoggingSection,
}

impl MonitorConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `TaskCapError::ConfigError` if the TOML is malformed or holds
    /// an unknown enum value.
    pub fn from_toml_str(s: &str) -> TaskCapResult<Self> {
        toml::from_str(s).map_err(|e| TaskCapError::ConfigError {
            reason: format!("failed to parse monitor TOML: {}", e),
        })
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> TaskCapResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TaskCapError::ConfigError {
            reason: format!("failed to read monitor config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn rules(&self) -> CapabilityRules {
        CapabilityRules::new().with_malformed_policy(self.capability.malformed_spec)
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            zero_delay: self.timers.zero_delay,
        }
    }

    pub fn log_filter(&self) -> &str {
        self.logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// A fresh scheduling domain using `CapabilityAccessPolicy` and the
    /// given recorder.
    pub fn build_context(&self, recorder: Box<dyn AccessRecorder>) -> TaskContext {
        self.build_context_in(DomainId::new(), recorder)
    }

    /// Like `build_context`, for a domain id the host already holds.
    pub fn build_context_in(
        &self,
        domain_id: DomainId,
        recorder: Box<dyn AccessRecorder>,
    ) -> TaskContext {
        let ctx = TaskContext::new(self.rules(), Box::new(CapabilityAccessPolicy::new()), recorder)
            .with_domain_id(domain_id)
            .with_options(self.context_options());
        info!(
            domain_id = %ctx.domain_id(),
            malformed_spec = ?self.capability.malformed_spec,
            zero_delay = ?self.timers.zero_delay,
            "task context created"
        );
        ctx
    }
}

use serde::{Deserialize, Serialize};

/// Static identity of one competing agent.
///
/// Loaded from configuration once per run. Credentials are never stored here,
/// only the names of the environment variables holding them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    /// Key into `ArenaConfig::providers`.
    pub provider: String,
    /// Model id sent to the provider.
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the model id, for providers that issue
    /// per-deployment endpoint ids. Used when `model` is absent.
    #[serde(default)]
    pub model_env: Option<String>,
    pub api_key_env: String,
    pub role: String,
    pub style: String,
    /// Risk appetite 0-100. Raises sampling temperature.
    #[serde(default = "default_risk")]
    pub risk: u8,
}

fn default_risk() -> u8 {
    50
}

impl AgentProfile {
    /// Sampling temperature derived from risk appetite: 0.7 at risk 0, 1.2 at risk 100.
    pub fn temperature(&self) -> f64 {
        0.7 + f64::from(self.risk.min(100)) / 200.0
    }
}

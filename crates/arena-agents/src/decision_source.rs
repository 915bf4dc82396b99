use arena_models::agent::AgentProfile;
use async_trait::async_trait;

use crate::error::AgentError;

/// Whatever decides what an agent trades. Mockable for testing.
///
/// Returns the raw decision object (`{"action", "reason", "quantity"}` as the
/// provider produced it). The payload is untrusted: normalization happens in
/// the execution unit.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn decide(
        &self,
        agent: &AgentProfile,
        market_summary: &str,
    ) -> Result<serde_json::Value, AgentError>;
}

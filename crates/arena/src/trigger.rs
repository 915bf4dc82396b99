use arena_agents::CycleOrchestrator;
use arena_models::cycle::CycleReport;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Unauthorized")]
    Unauthorized,
}

/// An external request to run one cycle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerRequest {
    pub key: Option<String>,
    /// Skip the market-hours and quota gates.
    #[serde(default)]
    pub force: bool,
}

impl TriggerRequest {
    pub fn mode(&self) -> &'static str {
        if self.force {
            "forced"
        } else {
            "scheduled"
        }
    }
}

/// Byte comparison whose duration does not depend on where the inputs differ.
fn keys_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Run a cycle if the request carries the shared secret.
///
/// A missing secret (unset or empty) rejects every request. Rejection happens
/// before anything is read or written.
pub async fn trigger(
    orchestrator: &CycleOrchestrator,
    secret: Option<&str>,
    request: &TriggerRequest,
) -> Result<CycleReport, TriggerError> {
    let authorized = match (secret, request.key.as_deref()) {
        (Some(secret), Some(key)) if !secret.is_empty() => keys_match(key, secret),
        _ => false,
    };
    if !authorized {
        warn!("Rejected cycle trigger with bad key");
        return Err(TriggerError::Unauthorized);
    }

    info!(mode = request.mode(), "Cycle triggered");
    Ok(orchestrator.run_cycle(request.force).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_comparison() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cret", "s3cres"));
        assert!(!keys_match("s3cre", "s3cret"));
        assert!(keys_match("", ""));
    }

    #[test]
    fn mode_names() {
        assert_eq!(TriggerRequest::default().mode(), "scheduled");
        let forced = TriggerRequest {
            key: None,
            force: true,
        };
        assert_eq!(forced.mode(), "forced");
    }
}

pub mod decision_source;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod prompts;

pub mod test_support;

pub use decision_source::DecisionSource;
pub use error::AgentError;
pub use llm::ChatCompletionsSource;
pub use orchestrator::CycleOrchestrator;

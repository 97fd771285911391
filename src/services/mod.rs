pub mod browsing_agent;
pub mod llm_service;

pub use browsing_agent::{AgentTask, BrowsingAgent, ChromeAgent, PageSnapshot};
pub use llm_service::{LanguageModel, LlmService};

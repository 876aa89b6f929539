//! LLM integration: the Ollama chat client, the context report fed to it,
//! and the analysis service that builds prompts and extracts commands.

pub mod client;
pub mod context;
pub mod service;

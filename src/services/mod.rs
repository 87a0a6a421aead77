pub mod gateway;
pub mod normalizer;
pub mod orchestrator;
pub mod session;

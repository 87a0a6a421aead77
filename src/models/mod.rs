pub mod analysis_types;
pub mod gateway_types;
pub mod session_types;

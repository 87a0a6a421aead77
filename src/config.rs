use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Gateway address baked in at build time; `IMAGE_DETECT_API_URL` overrides the local default.
pub const DEFAULT_BASE_URL: &str = match option_env!("IMAGE_DETECT_API_URL") {
    Some(url) => url,
    None => "http://localhost:8000",
};

pub const DEFAULT_DEVICE: &str = "cpu";

pub mod endpoints {
    pub const HUGGINGFACE: &str = "/huggingface";
    pub const XCEPTION_DETECT: &str = "/xception/detect";
    pub const XCEPTION_WEIGHTS: &str = "/xception/weights";
    pub const ENSEMBLE_DETECT: &str = "/ensemble/detect";
    pub const CUT_FACE: &str = "/cut_face";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Inference device requested from the Gateway (`cpu` or `cuda`).
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            device: default_device(),
        }
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            GatewayError::Validation(format!("Invalid gateway URL {}: {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::Validation(format!(
                "Gateway URL must use http or https: {}",
                self.base_url
            )));
        }
        if self.device.trim().is_empty() {
            return Err(GatewayError::Validation("Gateway device must not be empty".into()));
        }
        Ok(())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

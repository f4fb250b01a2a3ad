use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sampling knobs forwarded to the backbone.
///
/// Lower temperatures (around 0.1) give stable delivery, higher ones (1.0 and
/// up) are more expressive. `top_k` bounds how many candidate tokens are
/// considered at each step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 50,
        }
    }
}

impl SamplingParams {
    pub fn new(temperature: f32, top_k: u32) -> Self {
        Self { temperature, top_k }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(Error::InvalidParams(format!(
                "temperature must be a positive number, got {}",
                self.temperature
            )));
        }
        if self.top_k == 0 {
            return Err(Error::InvalidParams("top_k must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_values() {
        let params = SamplingParams::default();
        assert_eq!(params.temperature, 1.0);
        assert_eq!(params.top_k, 50);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_temperature() {
        assert!(SamplingParams::new(0.0, 50).validate().is_err());
        assert!(SamplingParams::new(-0.5, 50).validate().is_err());
        assert!(SamplingParams::new(f32::NAN, 50).validate().is_err());
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = SamplingParams::new(0.7, 0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }
}

use crate::config::Config;
use crate::error::{Result, RunfuseError, ValidationError};
use regex::Regex;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // Validate schema version
        Self::validate_schema_version(config, &mut errors);

        // Validate fusion settings
        Self::validate_fusion(config, &mut errors);

        // Validate rerank settings
        Self::validate_rerank(config, &mut errors);

        // Validate output settings
        Self::validate_output(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RunfuseError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_fusion(config: &Config, errors: &mut Vec<ValidationError>) {
        let fusion = &config.fusion;

        if !fusion.rrf_k.is_finite() || fusion.rrf_k < 0.0 {
            errors.push(ValidationError::new(
                "fusion.rrf_k",
                format!("RRF k must be a non-negative number, got {}", fusion.rrf_k),
            ));
        }

        if fusion.depth == 0 {
            errors.push(ValidationError::new(
                "fusion.depth",
                "Depth must be greater than 0",
            ));
        }

        if fusion.max_docs == 0 {
            errors.push(ValidationError::new(
                "fusion.max_docs",
                "Max docs must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&fusion.alpha) {
            errors.push(ValidationError::new(
                "fusion.alpha",
                format!("Alpha must be between 0.0 and 1.0, got {}", fusion.alpha),
            ));
        }
    }

    fn validate_rerank(config: &Config, errors: &mut Vec<ValidationError>) {
        let rerank = &config.rerank;

        if !rerank.epsilon.is_finite() || rerank.epsilon < 0.0 {
            errors.push(ValidationError::new(
                "rerank.epsilon",
                format!("Epsilon must be a non-negative number, got {}", rerank.epsilon),
            ));
        }

        if !rerank.perturbation_step.is_finite() || rerank.perturbation_step < 0.0 {
            errors.push(ValidationError::new(
                "rerank.perturbation_step",
                format!(
                    "Perturbation step must be a non-negative number, got {}",
                    rerank.perturbation_step
                ),
            ));
        }

        if let Some(pattern) = &rerank.key_pattern {
            match Regex::new(pattern) {
                Ok(re) if re.captures_len() < 2 => errors.push(ValidationError::new(
                    "rerank.key_pattern",
                    "Key pattern needs a capture group",
                )),
                Ok(_) => {}
                Err(e) => errors.push(ValidationError::new(
                    "rerank.key_pattern",
                    format!("Invalid regex: {}", e),
                )),
            }
        }
    }

    fn validate_output(config: &Config, errors: &mut Vec<ValidationError>) {
        let tag = &config.output.run_tag;
        if tag.is_empty() || !tag.is_ascii() || tag.chars().any(|c| c.is_ascii_whitespace()) {
            errors.push(ValidationError::new(
                "output.run_tag",
                format!("Run tag must be non-empty ASCII without whitespace: {:?}", tag),
            ));
        }

        if let Some(precision) = config.output.precision {
            if precision > 17 {
                errors.push(ValidationError::new(
                    "output.precision",
                    format!("Precision must be at most 17 decimals, got {}", precision),
                ));
            }
        }
    }
}

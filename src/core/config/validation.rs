use super::types::{AgentConfig, AppConfig};
use crate::core::errors::ConfigError;

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_agent_config(&config.agent)
}

pub fn validate_agent_config(agent: &AgentConfig) -> Result<(), ConfigError> {
    validate_probability("agent.knowledge_dropout", agent.knowledge_dropout)?;
    validate_positive("agent.learningrate", agent.learningrate)?;
    validate_positive("agent.lr_factor", agent.lr_factor)?;
    validate_optional_nonzero("agent.truncate", agent.truncate)?;
    validate_optional_nonzero("agent.history_size", agent.history_size)?;
    Ok(())
}

fn validate_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("must be within [0, 1], got {}", value),
        ));
    }
    Ok(())
}

fn validate_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(
            field,
            format!("must be a positive number, got {}", value),
        ));
    }
    Ok(())
}

fn validate_optional_nonzero(field: &str, value: Option<usize>) -> Result<(), ConfigError> {
    if value == Some(0) {
        return Err(ConfigError::invalid(field, "must be at least 1 when set"));
    }
    Ok(())
}

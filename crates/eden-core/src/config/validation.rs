//! Configuration validation

use std::collections::HashSet;

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_bundles(config)?;
    validate_cluster(config)?;
    validate_roles(config)?;
    validate_watch(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_bundles(config: &Config) -> Result<()> {
    if config.bundles.tasks.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "bundles.tasks".to_string(),
            message: "task manifest pattern cannot be empty".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_cluster(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for (i, role) in config.cluster.roles.iter().enumerate() {
        if role.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("cluster.roles[{}]", i),
                message: "role names cannot be empty".to_string(),
            }
            .into());
        }

        if !seen.insert(role.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: format!("cluster.roles[{}]", i),
                message: format!("duplicate role '{}'", role),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_roles(config: &Config) -> Result<()> {
    for (name, role) in &config.roles {
        if role.command.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: format!("roles.{}.command", name),
                message: "command cannot be empty".to_string(),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_watch(config: &Config) -> Result<()> {
    if config.watch.debounce_ms == 0 {
        return Err(ConfigError::InvalidValue {
            field: "watch.debounce_ms".to_string(),
            message: "must be greater than zero".to_string(),
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleConfig;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_duplicate_role() {
        let mut config = Config::default();
        config.cluster.roles = vec!["front".to_string(), "front".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_role() {
        let mut config = Config::default();
        config.cluster.roles = vec![" ".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_role_command() {
        let mut config = Config::default();
        config.roles.insert(
            "front".to_string(),
            RoleConfig {
                command: Some(String::new()),
                ..Default::default()
            },
        );
        assert!(validate_config(&config).is_err());
    }
}

//! Configuration validation

use std::collections::HashSet;

use kubackup_stores::BackendConfig;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::naming::TEMPLATE_PLACEHOLDERS;

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_cluster(config)?;
    validate_storage(config)?;
    validate_layout(config)?;
    validate_retention(config)?;
    validate_notifications(config)?;
    validate_targets(config)?;
    debug!("configuration validation passed");
    Ok(())
}

/// Non-fatal findings worth reporting to the user
pub fn config_warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.targets.is_empty() {
        warnings.push("No backup targets configured".to_string());
    }

    for target in &config.targets {
        if target.pod.is_some() && target.selector.is_some() {
            warnings.push(format!(
                "targets.{}: both pod and selector set, the explicit pod is used",
                target.name
            ));
        }
        if !target.enabled {
            warnings.push(format!("targets.{}: disabled", target.name));
        }
    }

    if config.notifications.webhook_url.is_none() {
        warnings.push("No notification webhook configured".to_string());
    }

    warnings
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_cluster(config: &Config) -> Result<()> {
    if config.cluster.kubectl.trim().is_empty() {
        return Err(invalid("cluster.kubectl", "kubectl path cannot be empty").into());
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<()> {
    if config.storage.is_empty() && !config.targets.is_empty() {
        return Err(ConfigError::MissingField("storage".to_string()).into());
    }

    let mut names = HashSet::new();
    for (i, storage) in config.storage.iter().enumerate() {
        if storage.name.trim().is_empty() {
            return Err(invalid(format!("storage[{}].name", i), "name cannot be empty").into());
        }
        if !names.insert(storage.name.as_str()) {
            return Err(invalid(
                format!("storage[{}].name", i),
                format!("duplicate destination name '{}'", storage.name),
            )
            .into());
        }

        match &storage.backend {
            BackendConfig::S3(s3) => {
                if s3.bucket.trim().is_empty() {
                    return Err(invalid(format!("storage[{}].bucket", i), "bucket cannot be empty").into());
                }
                if let Some(endpoint) = &s3.endpoint_url {
                    check_http_url(&format!("storage[{}].endpoint_url", i), endpoint)?;
                }
            }
            BackendConfig::Swift(swift) => {
                if swift.container.trim().is_empty() {
                    return Err(
                        invalid(format!("storage[{}].container", i), "container cannot be empty").into(),
                    );
                }
                if swift.segment_size == Some(0) {
                    return Err(invalid(
                        format!("storage[{}].segment_size", i),
                        "segment size must be positive",
                    )
                    .into());
                }
            }
        }
    }

    Ok(())
}

fn validate_layout(config: &Config) -> Result<()> {
    let template = &config.layout.template;

    for required in ["{timestamp}", "{ext}"] {
        if !template.contains(required) {
            return Err(invalid(
                "layout.template",
                format!("must contain {} placeholder", required),
            )
            .into());
        }
    }

    // Retention lists everything under the part before {timestamp}; without
    // the target name there, one target would prune another's snapshots.
    let (head, tail) = template.split_once("{timestamp}").unwrap_or_default();
    if !head.contains("{target}") {
        return Err(invalid(
            "layout.template",
            "{target} must appear before {timestamp} so each target keeps its own snapshots",
        )
        .into());
    }
    if tail.contains("{timestamp}") {
        return Err(invalid("layout.template", "{timestamp} may appear only once").into());
    }

    let mut rest = template.as_str();
    while let Some(start) = rest.find('{') {
        let end = rest[start..]
            .find('}')
            .ok_or_else(|| invalid("layout.template", "unclosed placeholder"))?;
        let placeholder = &rest[start..start + end + 1];
        if !TEMPLATE_PLACEHOLDERS.contains(&placeholder) {
            return Err(invalid(
                "layout.template",
                format!(
                    "unknown placeholder {}, expected one of: {}",
                    placeholder,
                    TEMPLATE_PLACEHOLDERS.join(", ")
                ),
            )
            .into());
        }
        rest = &rest[start + end + 1..];
    }

    if config.layout.prefix.contains('{') {
        return Err(invalid("layout.prefix", "prefix cannot contain placeholders").into());
    }

    Ok(())
}

fn validate_retention(config: &Config) -> Result<()> {
    if config.retention.keep_last == 0 {
        return Err(invalid("retention.keep_last", "must keep at least one snapshot").into());
    }
    Ok(())
}

fn validate_notifications(config: &Config) -> Result<()> {
    if let Some(url) = &config.notifications.webhook_url {
        check_http_url("notifications.webhook_url", url)?;
    }
    if config.notifications.timeout_secs == 0 {
        return Err(invalid("notifications.timeout_secs", "timeout must be positive").into());
    }
    Ok(())
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).map_err(|e| invalid(field, format!("invalid URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(field, "URL scheme must be http or https").into());
    }
    Ok(())
}

fn validate_targets(config: &Config) -> Result<()> {
    if !config.targets.is_empty() {
        debug!(count = config.targets.len(), "validating targets");
    }

    let storage_names: HashSet<&str> = config.storage.iter().map(|s| s.name.as_str()).collect();
    let mut names = HashSet::new();

    for (i, target) in config.targets.iter().enumerate() {
        let field = |name: &str| format!("targets[{}].{}", i, name);

        if target.name.is_empty()
            || !target
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid(
                field("name"),
                "name must be non-empty and use only letters, digits, '-', '_' or '.'",
            )
            .into());
        }
        if !names.insert(target.name.as_str()) {
            return Err(invalid(field("name"), format!("duplicate target '{}'", target.name)).into());
        }

        if target.namespace.trim().is_empty() {
            return Err(invalid(field("namespace"), "namespace cannot be empty").into());
        }

        if target.pod.is_none() && target.selector.is_none() {
            return Err(invalid(field("selector"), "either pod or selector is required").into());
        }

        if let Some(storage) = &target.storage {
            if !storage_names.contains(storage.as_str()) {
                return Err(invalid(
                    field("storage"),
                    format!("unknown storage destination '{}'", storage),
                )
                .into());
            }
        }

        if target.keep_last == Some(0) {
            return Err(invalid(field("keep_last"), "must keep at least one snapshot").into());
        }

        if target.timeout_secs == 0 {
            return Err(invalid(field("timeout_secs"), "timeout must be positive").into());
        }

        target
            .dump_command()
            .map_err(|e| invalid(field("kind"), e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::types::BackupKind;
    use kubackup_stores::{S3Config, StorageConfig};

    fn valid_config() -> Config {
        let mut target = TargetConfig::new("db", BackupKind::Postgres);
        target.selector = Some("app=db".to_string());

        Config {
            storage: vec![StorageConfig {
                name: "primary".to_string(),
                backend: BackendConfig::S3(S3Config {
                    bucket: "backups".to_string(),
                    ..Default::default()
                }),
            }],
            targets: vec![target],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_targets_require_storage() {
        let mut config = valid_config();
        config.storage.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_template_placeholders() {
        let mut config = valid_config();
        config.layout.template = "{namespace}/{name}.{ext}".to_string();
        assert!(validate_config(&config).is_err());

        config.layout.template = "{namespace}/{pod}/{timestamp}.{ext}".to_string();
        assert!(validate_config(&config).is_err());

        config.layout.template = "{kind}/{target}-{timestamp}.{ext}".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_template_needs_target_before_timestamp() {
        let mut config = valid_config();
        for template in [
            "{timestamp}-{namespace}-{name}.{ext}",
            "{namespace}/{name}/{timestamp}.{ext}",
            "{namespace}/{timestamp}-{target}.{ext}",
            "{target}/{timestamp}/{timestamp}.{ext}",
        ] {
            config.layout.template = template.to_string();
            let err = validate_config(&config).unwrap_err();
            assert!(err.to_string().contains("layout.template"), "{}", template);
        }

        config.layout.template = "{namespace}/{name}/{target}/{timestamp}.{ext}".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_keep_last_zero() {
        let mut config = valid_config();
        config.retention.keep_last = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.targets[0].keep_last = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_webhook_url() {
        let mut config = valid_config();
        config.notifications.webhook_url = Some("ftp://example.com/hook".to_string());
        assert!(validate_config(&config).is_err());

        config.notifications.webhook_url = Some("https://hooks.example.com/x".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_target_needs_pod_or_selector() {
        let mut config = valid_config();
        config.targets[0].selector = None;
        assert!(validate_config(&config).is_err());

        config.targets[0].pod = Some("db-0".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_duplicate_target_names() {
        let mut config = valid_config();
        let dup = config.targets[0].clone();
        config.targets.push(dup);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unknown_storage_reference() {
        let mut config = valid_config();
        config.targets[0].storage = Some("archive".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_files_target_without_paths() {
        let mut config = valid_config();
        config.targets[0].kind = BackupKind::Files;
        assert!(validate_config(&config).is_err());

        config.targets[0].paths = vec!["/data".to_string()];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_warnings() {
        let mut config = valid_config();
        config.targets[0].pod = Some("db-0".to_string());
        config.targets[0].enabled = false;

        let warnings = config_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("explicit pod")));
        assert!(warnings.iter().any(|w| w.contains("disabled")));
        assert!(warnings.iter().any(|w| w.contains("webhook")));
    }
}

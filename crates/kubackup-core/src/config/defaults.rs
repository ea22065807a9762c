//! Default configuration values

use std::path::PathBuf;

use super::types::Config;

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "kubackup.yaml";

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "kubackup.toml";

/// Alternative configuration file name
pub const ALT_CONFIG_FILE: &str = ".kubackup.yaml";

/// System-wide configuration, checked after the directory walk
pub const SYSTEM_CONFIG_PATH: &str = "/etc/kubackup/kubackup.yaml";

/// Environment variable pointing at a configuration file
pub const CONFIG_ENV_VAR: &str = "KUBACKUP_CONFIG";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_YAML,
        DEFAULT_CONFIG_TOML,
        ALT_CONFIG_FILE,
        ".kubackup.toml",
    ]
}

/// System-wide configuration path
pub fn system_config_path() -> PathBuf {
    PathBuf::from(SYSTEM_CONFIG_PATH)
}

/// Generate default configuration YAML
pub fn default_config_yaml() -> String {
    let config = Config::default();
    serde_yaml::to_string(&config).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# kubackup configuration

cluster:
  kubectl: kubectl
  # context: production
  request_timeout_secs: 30

storage:
  - name: primary
    backend: s3
    bucket: my-backups
    # endpoint_url: http://minio.storage.svc:9000
    # region: eu-west-1
  # - name: archive
  #   backend: swift
  #   container: backups

layout:
  prefix: kubackup
  template: "{namespace}/{name}/{target}/{timestamp}.{ext}"

retention:
  keep_last: 7
  # keep_days: 30

compression: gzip

notifications:
  # webhook_url: https://hooks.slack.com/services/XXX
  format: slack
  on: always
  timeout_secs: 10

hooks:
  pre-run: []
  pre-backup: []
  post-backup: []
  on-failure: []
  post-run: []

targets:
  - name: postgres
    kind: postgres
    namespace: default
    selector: app=postgres
"#;

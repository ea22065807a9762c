//! Local shell hooks around a backup run.
//!
//! Stages fire in this order: `pre-run` once, then per target `pre-backup`,
//! `post-backup` (or `on-failure`), and finally `post-run` once. Each hook
//! is a `sh -c` command that sees the run state as `KUBACKUP_*` variables.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{HookError, Result};

/// Hooks without an explicit timeout are killed after this many seconds
pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 600;

const ENV_PREFIX: &str = "KUBACKUP_";

/// Point in the run where hooks fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookStage {
    PreRun,
    PreBackup,
    PostBackup,
    OnFailure,
    PostRun,
}

impl HookStage {
    const ORDERED: [HookStage; 5] = [
        Self::PreRun,
        Self::PreBackup,
        Self::PostBackup,
        Self::OnFailure,
        Self::PostRun,
    ];

    /// Config key and log name of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreRun => "pre-run",
            Self::PreBackup => "pre-backup",
            Self::PostBackup => "post-backup",
            Self::OnFailure => "on-failure",
            Self::PostRun => "post-run",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ORDERED.into_iter().find(|s| s.as_str() == name)
    }

    /// Stages in firing order
    pub fn all() -> &'static [HookStage] {
        &Self::ORDERED
    }
}

impl std::fmt::Display for HookStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One shell command bound to a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "HookConfig", into = "HookConfig")]
pub struct Hook {
    pub command: String,
    pub cwd: Option<PathBuf>,
    /// Extra variables, applied after the run context
    pub env: HashMap<String, String>,
    /// A failing hook aborts its stage unless this is false
    pub fail_on_error: bool,
    pub timeout: Option<u64>,
    pub description: Option<String>,
}

impl Hook {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: HashMap::new(),
            fail_on_error: true,
            timeout: None,
            description: None,
        }
    }

    pub fn with_fail_on_error(self, fail_on_error: bool) -> Self {
        Self {
            fail_on_error,
            ..self
        }
    }

    pub fn with_timeout(self, seconds: u64) -> Self {
        Self {
            timeout: Some(seconds),
            ..self
        }
    }

    fn deadline(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_HOOK_TIMEOUT_SECS)
    }

    fn name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.command)
    }
}

/// Hook as written in the config file: a bare string or a table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookConfig {
    Command(String),
    Detailed {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
        #[serde(default = "fail_on_error_default")]
        fail_on_error: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

fn fail_on_error_default() -> bool {
    true
}

impl From<HookConfig> for Hook {
    fn from(raw: HookConfig) -> Self {
        match raw {
            HookConfig::Command(command) => Hook::new(command),
            HookConfig::Detailed {
                command,
                cwd,
                env,
                fail_on_error,
                timeout,
                description,
            } => Hook {
                command,
                cwd,
                env,
                fail_on_error,
                timeout,
                description,
            },
        }
    }
}

impl From<Hook> for HookConfig {
    fn from(hook: Hook) -> Self {
        let plain = hook.cwd.is_none()
            && hook.env.is_empty()
            && hook.fail_on_error
            && hook.timeout.is_none()
            && hook.description.is_none();
        if plain {
            return HookConfig::Command(hook.command);
        }
        HookConfig::Detailed {
            command: hook.command,
            cwd: hook.cwd,
            env: hook.env,
            fail_on_error: hook.fail_on_error,
            timeout: hook.timeout,
            description: hook.description,
        }
    }
}

/// The `hooks:` section, one list per stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HooksConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_run: Vec<Hook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_backup: Vec<Hook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_backup: Vec<Hook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub on_failure: Vec<Hook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_run: Vec<Hook>,
}

impl HooksConfig {
    pub fn for_stage(&self, stage: HookStage) -> &[Hook] {
        match stage {
            HookStage::PreRun => &self.pre_run,
            HookStage::PreBackup => &self.pre_backup,
            HookStage::PostBackup => &self.post_backup,
            HookStage::OnFailure => &self.on_failure,
            HookStage::PostRun => &self.post_run,
        }
    }
}

/// What a finished hook produced
#[derive(Debug, Clone)]
pub struct HookResult {
    pub stage: HookStage,
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl HookResult {
    fn describe_failure(&self) -> String {
        let stderr = self.stderr.trim();
        match self.exit_code {
            None => "terminated by signal".to_string(),
            Some(code) if stderr.is_empty() => format!("exited with code {}", code),
            Some(code) => format!("exited with code {}: {}", code, stderr),
        }
    }
}

/// Run state exported to hooks.
///
/// Variables are stored without the `KUBACKUP_` prefix; [`HookContext::to_env`]
/// adds it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookContext {
    vars: BTreeMap<String, String>,
    dry_run: bool,
}

impl HookContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable; the name is upper-cased
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_uppercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(&name.to_uppercase()).map(String::as_str)
    }

    fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_run_id(self, run_id: impl Into<String>) -> Self {
        self.with("run_id", run_id)
    }

    pub fn with_target(self, target: impl Into<String>) -> Self {
        self.with("target", target)
    }

    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        self.with("namespace", namespace)
    }

    pub fn with_pod(self, pod: impl Into<String>) -> Self {
        self.with("pod", pod)
    }

    pub fn with_kind(self, kind: impl Into<String>) -> Self {
        self.with("kind", kind)
    }

    pub fn with_key(self, key: impl Into<String>) -> Self {
        self.with("key", key)
    }

    pub fn with_storage(self, storage: impl Into<String>) -> Self {
        self.with("storage", storage)
    }

    pub fn with_error(self, error: impl Into<String>) -> Self {
        self.with("error", error)
    }

    /// Any other variable, such as the post-run `status`
    pub fn with_custom(self, name: &str, value: impl Into<String>) -> Self {
        self.with(name, value)
    }

    pub fn with_dry_run(self, dry_run: bool) -> Self {
        Self { dry_run, ..self }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Prefixed environment for the hook process
    pub fn to_env(&self) -> HashMap<String, String> {
        self.vars
            .iter()
            .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.clone()))
            .chain([(format!("{}DRY_RUN", ENV_PREFIX), self.dry_run.to_string())])
            .collect()
    }
}

/// Hooks grouped by stage, ready to run
#[derive(Debug, Clone, Default)]
pub struct HookRunner {
    stages: BTreeMap<HookStage, Vec<Hook>>,
    base_dir: Option<PathBuf>,
}

impl HookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory hooks run in when they name no `cwd`
    pub fn with_base_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
            ..self
        }
    }

    pub fn register(&mut self, stage: HookStage, hook: Hook) {
        self.stages.entry(stage).or_default().push(hook);
    }

    pub fn get_hooks(&self, stage: HookStage) -> &[Hook] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_hooks(&self, stage: HookStage) -> bool {
        !self.get_hooks(stage).is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the hooks of `stage` one after another.
    ///
    /// The first failure of a hook with `fail_on_error` ends the stage with
    /// an error and later hooks are not started. Other failures are logged.
    pub async fn run(&self, stage: HookStage, context: &HookContext) -> Result<Vec<HookResult>> {
        let hooks = self.get_hooks(stage);
        if hooks.is_empty() {
            return Ok(Vec::new());
        }
        debug!(stage = %stage, count = hooks.len(), "running hooks");

        let env = context.to_env();
        let mut results = Vec::with_capacity(hooks.len());
        for hook in hooks {
            let result = self.spawn(stage, hook, &env).await?;
            if !result.success {
                if hook.fail_on_error {
                    return Err(HookError::ExecutionFailed {
                        stage: stage.to_string(),
                        command: hook.command.clone(),
                        message: result.describe_failure(),
                    }
                    .into());
                }
                warn!(stage = %stage, hook = hook.name(), code = ?result.exit_code, "ignoring hook failure");
            }
            results.push(result);
        }
        Ok(results)
    }

    async fn spawn(
        &self,
        stage: HookStage,
        hook: &Hook,
        env: &HashMap<String, String>,
    ) -> Result<HookResult> {
        info!(stage = %stage, hook = hook.name(), "running hook");
        let started = Instant::now();

        let mut command = Command::new("sh");
        command
            .args(["-c", &hook.command])
            .envs(env)
            .envs(&hook.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = hook.cwd.as_deref().or(self.base_dir.as_deref()) {
            command.current_dir(dir);
        }

        let seconds = hook.deadline();
        let output = match tokio::time::timeout(Duration::from_secs(seconds), command.output()).await {
            Err(_) => {
                return Err(HookError::Timeout {
                    stage: stage.to_string(),
                    command: hook.command.clone(),
                    seconds,
                }
                .into())
            }
            Ok(Err(e)) => {
                return Err(HookError::ExecutionFailed {
                    stage: stage.to_string(),
                    command: hook.command.clone(),
                    message: e.to_string(),
                }
                .into())
            }
            Ok(Ok(output)) => output,
        };

        let result = HookResult {
            stage,
            command: hook.command.clone(),
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        debug!(stage = %stage, duration_ms = result.duration_ms, success = result.success, "hook done");
        Ok(result)
    }
}

/// Turn the `hooks:` section into a runner
pub fn build_hook_runner(config: &HooksConfig, base_dir: Option<&Path>) -> HookRunner {
    let runner = match base_dir {
        Some(dir) => HookRunner::new().with_base_dir(dir),
        None => HookRunner::new(),
    };
    HookStage::all().iter().fold(runner, |mut runner, &stage| {
        for hook in config.for_stage(stage) {
            runner.register(stage, hook.clone());
        }
        runner
    })
}

//! `kubectl` CLI wrapper

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use kubackup_core::config::ClusterConfig;
use kubackup_core::{ClusterError, DumpError, Result};

use crate::client::{ClusterClient, ClusterVersion, ExecOutcome, ExecRequest};
use crate::pod::{parse_pod, parse_pod_list, Pod};

/// Cluster client backed by the `kubectl` binary
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: String,
    context: Option<String>,
    kubeconfig: Option<PathBuf>,
    request_timeout: Duration,
}

impl Kubectl {
    /// Create a client for the given `kubectl` executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            context: None,
            kubeconfig: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            program: config.kubectl.clone(),
            context: config.context.clone(),
            kubeconfig: config.kubeconfig.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the executable can be found
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Arguments every invocation starts with.
    ///
    /// `--request-timeout` is left out for exec streams, which may run for
    /// much longer than an API call.
    pub fn global_args(&self, api_call: bool) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        if api_call {
            args.push(format!("--request-timeout={}s", self.request_timeout.as_secs()));
        }
        args
    }

    pub fn list_pods_args(&self, namespace: &str, selector: &str) -> Vec<String> {
        let mut args = self.global_args(true);
        args.extend(
            ["get", "pods", "-n", namespace, "-l", selector, "-o", "json"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    pub fn get_pod_args(&self, namespace: &str, name: &str) -> Vec<String> {
        let mut args = self.global_args(true);
        args.extend(
            ["get", "pod", name, "-n", namespace, "-o", "json"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    pub fn exec_args(&self, exec: &ExecRequest) -> Vec<String> {
        let mut args = self.global_args(false);
        args.extend(
            ["exec", "-i", "-n", exec.namespace.as_str(), exec.pod.as_str()]
                .iter()
                .map(|s| s.to_string()),
        );
        if let Some(container) = &exec.container {
            args.push("-c".to_string());
            args.push(container.clone());
        }
        args.extend(
            ["--", "sh", "-c", exec.command.as_str()]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    pub fn version_args(&self, client_only: bool) -> Vec<String> {
        let mut args = self.global_args(true);
        args.push("version".to_string());
        if client_only {
            args.push("--client".to_string());
        }
        args.push("-o".to_string());
        args.push("json".to_string());
        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run_api(&self, verb: &str, args: &[String]) -> std::result::Result<String, ClusterError> {
        debug!(?args, "running kubectl");
        // The client-side limit backs up kubectl's own request timeout.
        let limit = self.request_timeout + Duration::from_secs(5);

        let output = tokio::time::timeout(limit, self.command(args).output())
            .await
            .map_err(|_| ClusterError::CommandFailed {
                command: verb.to_string(),
                message: format!("no response after {}s", limit.as_secs()),
            })?
            .map_err(|e| self.spawn_error(verb, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ClusterError::CommandFailed {
                command: verb.to_string(),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn spawn_error(&self, verb: &str, e: std::io::Error) -> ClusterError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ClusterError::KubectlNotFound(self.program.clone())
        } else {
            ClusterError::CommandFailed {
                command: verb.to_string(),
                message: e.to_string(),
            }
        }
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl ClusterClient for Kubectl {
    #[instrument(skip(self))]
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        let stdout = self
            .run_api("get pods", &self.list_pods_args(namespace, selector))
            .await?;
        let pods = parse_pod_list(&stdout)?;
        debug!(count = pods.len(), "listed pods");
        Ok(pods)
    }

    #[instrument(skip(self))]
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        match self.run_api("get pod", &self.get_pod_args(namespace, name)).await {
            Ok(stdout) => Ok(parse_pod(&stdout)?),
            Err(ClusterError::CommandFailed { message, .. })
                if message.contains("NotFound") || message.contains("not found") =>
            {
                Err(ClusterError::PodNotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, exec), fields(namespace = %exec.namespace, pod = %exec.pod))]
    async fn exec_to_file(&self, exec: &ExecRequest, dest: &Path) -> Result<ExecOutcome> {
        let cmd = self.command(&self.exec_args(exec));
        stream_to_file(cmd, dest, &exec.pod, exec.timeout)
            .await
            .map_err(|e| match e {
                StreamError::Spawn(io) => self.spawn_error("exec", io).into(),
                StreamError::Dump(dump) => dump.into(),
            })
    }

    async fn version(&self) -> Result<ClusterVersion> {
        match self.run_api("version", &self.version_args(false)).await {
            Ok(stdout) => Ok(parse_version(&stdout)?),
            Err(ClusterError::CommandFailed { message, .. }) => {
                warn!(%message, "cluster unreachable, reporting client version only");
                let stdout = self.run_api("version", &self.version_args(true)).await?;
                let mut version = parse_version(&stdout)?;
                version.server = None;
                Ok(version)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug)]
enum StreamError {
    Spawn(std::io::Error),
    Dump(DumpError),
}

/// Run `cmd`, copying its stdout into `dest` until it exits or `timeout`
/// elapses. The child is killed on timeout.
async fn stream_to_file(
    mut cmd: Command,
    dest: &Path,
    pod: &str,
    timeout: Duration,
) -> std::result::Result<ExecOutcome, StreamError> {
    let started = Instant::now();
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| StreamError::Dump(DumpError::Io(e)))?;

    let mut child = cmd.spawn().map_err(StreamError::Spawn)?;
    let io_error = |what: &str| {
        StreamError::Dump(DumpError::Io(std::io::Error::other(format!(
            "{} of exec not captured",
            what
        ))))
    };
    let mut stdout = child.stdout.take().ok_or_else(|| io_error("stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| io_error("stderr"))?;

    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let work = async {
        let bytes = tokio::io::copy(&mut stdout, &mut file).await?;
        file.flush().await?;
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((bytes, status))
    };
    let outcome = tokio::time::timeout(timeout, work).await;

    let (bytes, status) = match outcome {
        Err(_) => {
            let _ = child.kill().await;
            stderr_task.abort();
            return Err(StreamError::Dump(DumpError::Timeout {
                pod: pod.to_string(),
                seconds: timeout.as_secs(),
            }));
        }
        Ok(result) => result.map_err(|e| StreamError::Dump(DumpError::Io(e)))?,
    };

    let stderr = stderr_task.await.unwrap_or_default();
    let stderr = stderr.trim().to_string();

    if !status.success() {
        return Err(StreamError::Dump(DumpError::CommandFailed {
            pod: pod.to_string(),
            code: status.code(),
            stderr,
        }));
    }

    info!(pod, bytes, duration_ms = started.elapsed().as_millis() as u64, "exec finished");
    Ok(ExecOutcome { bytes, stderr })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVersion {
    client_version: Option<RawVersionInfo>,
    server_version: Option<RawVersionInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVersionInfo {
    git_version: String,
}

/// Parse `kubectl version -o json`
pub fn parse_version(json: &str) -> std::result::Result<ClusterVersion, ClusterError> {
    let raw: RawVersion = serde_json::from_str(json)
        .map_err(|e| ClusterError::UnexpectedOutput(format!("version: {}", e)))?;
    let client = raw
        .client_version
        .map(|v| v.git_version)
        .ok_or_else(|| ClusterError::UnexpectedOutput("version: no clientVersion".to_string()))?;
    Ok(ClusterVersion {
        client,
        server: raw.server_version.map(|v| v.git_version),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exec(command: &str) -> ExecRequest {
        ExecRequest {
            namespace: "prod".to_string(),
            pod: "postgres-0".to_string(),
            container: None,
            command: command.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    #[test]
    fn test_global_args() {
        let kubectl = Kubectl::new("kubectl")
            .with_context("prod")
            .with_kubeconfig("/etc/kube/config")
            .with_request_timeout(Duration::from_secs(15));

        assert_eq!(
            kubectl.global_args(true),
            vec![
                "--context",
                "prod",
                "--kubeconfig",
                "/etc/kube/config",
                "--request-timeout=15s"
            ]
        );
        assert_eq!(kubectl.global_args(false).len(), 4);
    }

    #[test]
    fn test_list_and_get_args() {
        let kubectl = Kubectl::default();
        assert_eq!(
            kubectl.list_pods_args("prod", "app=db"),
            vec!["--request-timeout=30s", "get", "pods", "-n", "prod", "-l", "app=db", "-o", "json"]
        );
        assert_eq!(
            kubectl.get_pod_args("prod", "db-0"),
            vec!["--request-timeout=30s", "get", "pod", "db-0", "-n", "prod", "-o", "json"]
        );
    }

    #[test]
    fn test_exec_args() {
        let kubectl = Kubectl::default().with_context("staging");
        let mut request = exec("pg_dumpall -U postgres");
        request.container = Some("postgres".to_string());

        assert_eq!(
            kubectl.exec_args(&request),
            vec![
                "--context",
                "staging",
                "exec",
                "-i",
                "-n",
                "prod",
                "postgres-0",
                "-c",
                "postgres",
                "--",
                "sh",
                "-c",
                "pg_dumpall -U postgres"
            ]
        );
    }

    #[test]
    fn test_from_config() {
        let config = ClusterConfig {
            kubectl: "/usr/local/bin/kubectl".to_string(),
            context: Some("prod".to_string()),
            kubeconfig: None,
            request_timeout_secs: 5,
        };
        let kubectl = Kubectl::from_config(&config);
        assert_eq!(kubectl.program(), "/usr/local/bin/kubectl");
        assert!(kubectl.version_args(true).contains(&"--client".to_string()));
        assert!(kubectl.global_args(true).contains(&"--request-timeout=5s".to_string()));
    }

    #[test]
    fn test_parse_version() {
        let json = r#"{"clientVersion": {"gitVersion": "v1.29.2", "major": "1"},
            "serverVersion": {"gitVersion": "v1.28.5+k3s1"}}"#;
        let version = parse_version(json).unwrap();
        assert_eq!(version.client, "v1.29.2");
        assert_eq!(version.server.as_deref(), Some("v1.28.5+k3s1"));

        let client_only = parse_version(r#"{"clientVersion": {"gitVersion": "v1.29.2"}}"#).unwrap();
        assert!(client_only.server.is_none());

        assert!(parse_version("{}").is_err());
    }

    #[tokio::test]
    async fn test_stream_to_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dump.sql");

        let outcome = stream_to_file(
            shell("printf 'CREATE TABLE t;'; echo 'dumping' >&2"),
            &dest,
            "db-0",
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(outcome.bytes, 15);
        assert_eq!(outcome.stderr, "dumping");
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "CREATE TABLE t;");
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_stderr() {
        let temp = TempDir::new().unwrap();
        let result = stream_to_file(
            shell("echo 'access denied' >&2; exit 2"),
            &temp.path().join("dump"),
            "db-0",
            Duration::from_secs(10),
        )
        .await;

        match result {
            Err(StreamError::Dump(DumpError::CommandFailed { code, stderr, .. })) => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "access denied");
            }
            _ => panic!("expected CommandFailed"),
        }
    }

    #[tokio::test]
    async fn test_stream_timeout() {
        let temp = TempDir::new().unwrap();
        let result = stream_to_file(
            shell("sleep 5"),
            &temp.path().join("dump"),
            "db-0",
            Duration::from_millis(200),
        )
        .await;

        assert!(matches!(
            result,
            Err(StreamError::Dump(DumpError::Timeout { .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_kubectl() {
        let kubectl = Kubectl::new("kubackup-test-no-such-kubectl");
        assert!(!kubectl.is_available());

        let err = kubectl.list_pods("default", "app=x").await.unwrap_err();
        assert!(matches!(
            err,
            kubackup_core::KubackupError::Cluster(ClusterError::KubectlNotFound(_))
        ));
    }
}

//! Backup path construction
//!
//! Pod names carry suffixes generated by their controllers
//! (`web-7d4b9c8f6-x2k9p`, `postgres-0`, `report-28472910-kx7pq`). Object
//! keys are built from the owning workload's name instead, so that every
//! snapshot of a workload lands under the same prefix no matter which pod
//! produced it.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::error::{KubackupError, Result};

/// Placeholders accepted in `layout.template`
pub const TEMPLATE_PLACEHOLDERS: &[&str] = &[
    "{namespace}",
    "{name}",
    "{target}",
    "{kind}",
    "{timestamp}",
    "{ext}",
];

/// UTC timestamp format used in keys; sorts lexicographically
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

const TIMESTAMP_LEN: usize = "20240101T000000Z".len();

/// Label set by the deployment controller on ReplicaSet pods
pub const POD_TEMPLATE_HASH_LABEL: &str = "pod-template-hash";

// Alphabet used by Kubernetes for generated name suffixes (no vowels, no 0/1/3).
static CRONJOB_POD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)-[0-9]{8,}-[bcdfghjklmnpqrstvwxz2456789]{5}$").expect("Invalid regex")
});

static DEPLOYMENT_POD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)-[bcdfghjklmnpqrstvwxz2456789]{6,10}-[bcdfghjklmnpqrstvwxz2456789]{5}$")
        .expect("Invalid regex")
});

static STATEFULSET_POD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-[0-9]+$").expect("Invalid regex"));

static GENERATED_POD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)-[bcdfghjklmnpqrstvwxz2456789]{5}$").expect("Invalid regex")
});

static REPLICASET_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)-[bcdfghjklmnpqrstvwxz2456789]{6,10}$").expect("Invalid regex")
});

static CRONJOB_JOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-[0-9]{8,}$").expect("Invalid regex"));

/// Owner reference of a pod, as found in `metadata.ownerReferences`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub controller: Option<bool>,
}

/// Derive the owning workload's name for a pod.
///
/// The controlling owner reference is used when present; otherwise the
/// name is recovered from the pod name with [`strip_generated_suffix`].
pub fn workload_name(
    pod_name: &str,
    owners: &[OwnerReference],
    labels: &BTreeMap<String, String>,
) -> String {
    let owner = owners
        .iter()
        .find(|o| o.controller == Some(true))
        .or_else(|| owners.first());

    let Some(owner) = owner else {
        return strip_generated_suffix(pod_name).to_string();
    };

    match owner.kind.as_str() {
        "StatefulSet" | "DaemonSet" => owner.name.clone(),
        "ReplicaSet" => {
            if let Some(hash) = labels.get(POD_TEMPLATE_HASH_LABEL) {
                if let Some(base) = owner.name.strip_suffix(hash.as_str()) {
                    if let Some(base) = base.strip_suffix('-').filter(|b| !b.is_empty()) {
                        return base.to_string();
                    }
                }
            }
            capture_or(&REPLICASET_HASH, &owner.name).to_string()
        }
        "Job" => capture_or(&CRONJOB_JOB, &owner.name).to_string(),
        _ => strip_generated_suffix(pod_name).to_string(),
    }
}

/// Strip a controller-generated suffix from a pod name.
///
/// Rules are tried in order and the first match wins: CronJob pods,
/// Deployment pods, StatefulSet ordinals, then single random suffixes.
/// The whole name is never stripped.
pub fn strip_generated_suffix(name: &str) -> &str {
    for rule in [&CRONJOB_POD, &DEPLOYMENT_POD, &STATEFULSET_POD, &GENERATED_POD] {
        if let Some(base) = rule.captures(name).and_then(|c| c.get(1)) {
            return base.as_str();
        }
    }
    name
}

fn capture_or<'a>(rule: &Regex, name: &'a str) -> &'a str {
    rule.captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(name)
}

/// Drop name segments that repeat an earlier segment
pub fn dedupe_segments(name: &str) -> String {
    let mut seen = HashSet::new();
    name.split('-')
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(*s))
        .collect::<Vec<_>>()
        .join("-")
}

/// Clean workload name used in keys.
///
/// `monitoring-prometheus-prometheus` in namespace `monitoring` becomes
/// `prometheus`.
pub fn clean_name(namespace: &str, workload: &str) -> String {
    let lowered = workload.to_lowercase();
    let ns_prefix = format!("{}-", namespace.to_lowercase());
    let stripped = lowered
        .strip_prefix(&ns_prefix)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(&lowered);

    let deduped = dedupe_segments(stripped);
    let sanitized: String = deduped
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect();

    let cleaned = sanitized
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Format a timestamp the way it appears in keys
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Values substituted into the key template
#[derive(Debug, Clone)]
pub struct PathContext {
    pub namespace: String,
    /// Clean workload name
    pub name: String,
    pub target: String,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub ext: String,
}

impl PathContext {
    pub fn new(
        target: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        ext: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            target: target.into(),
            kind: kind.into(),
            timestamp: Utc::now(),
            ext: ext.into(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Renders object keys from a layout
#[derive(Debug, Clone)]
pub struct BackupPath {
    prefix: String,
    template: String,
}

impl BackupPath {
    pub fn new(prefix: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            template: template.into(),
        }
    }

    pub fn from_layout(layout: &LayoutConfig) -> Self {
        Self::new(&layout.prefix, &layout.template)
    }

    /// Full object key for a snapshot
    pub fn render(&self, ctx: &PathContext) -> String {
        let rendered = substitute(&self.template, ctx);
        let key = normalize(&format!("{}/{}", self.prefix, rendered));
        key.trim_end_matches('/').to_string()
    }

    /// Key prefix shared by every snapshot of the context's workload.
    ///
    /// This is the template rendered up to `{timestamp}`; a trailing `/`
    /// is kept so that listing does not match sibling workloads.
    pub fn snapshot_prefix(&self, ctx: &PathContext) -> String {
        let head = self
            .template
            .split("{timestamp}")
            .next()
            .unwrap_or_default();
        normalize(&format!("{}/{}", self.prefix, substitute(head, ctx)))
    }

    /// Matcher for keys this target itself produced.
    ///
    /// The whole template is rendered with the context and only the
    /// timestamp left open, so keys of other targets, workloads or
    /// extensions under the same prefix never match.
    pub fn snapshot_matcher(&self, ctx: &PathContext) -> Result<SnapshotMatcher> {
        let rendered = normalize(&format!(
            "{}/{}",
            self.prefix,
            substitute_except_timestamp(&self.template, ctx)
        ));
        let rendered = rendered.trim_end_matches('/');

        let pattern = rendered
            .split(TIMESTAMP_SLOT)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"(\d{8}T\d{6}Z)");
        let regex = Regex::new(&format!("^{}$", pattern))
            .map_err(|e| KubackupError::other(format!("invalid key pattern: {}", e)))?;
        Ok(SnapshotMatcher { regex })
    }
}

const TIMESTAMP_SLOT: &str = "\u{0}timestamp\u{0}";

/// Recognises the keys of one target and reads their timestamps
#[derive(Debug, Clone)]
pub struct SnapshotMatcher {
    regex: Regex,
}

impl SnapshotMatcher {
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// Time encoded in a matching key
    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let stamp = self.regex.captures(key)?.get(1)?.as_str();
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .ok()
            .map(|t| t.and_utc())
    }
}

fn substitute_except_timestamp(template: &str, ctx: &PathContext) -> String {
    substitute(&template.replace("{timestamp}", TIMESTAMP_SLOT), ctx)
}

fn substitute(template: &str, ctx: &PathContext) -> String {
    template
        .replace("{namespace}", &ctx.namespace)
        .replace("{name}", &ctx.name)
        .replace("{target}", &ctx.target)
        .replace("{kind}", &ctx.kind)
        .replace("{timestamp}", &format_timestamp(ctx.timestamp))
        .replace("{ext}", ctx.ext.trim_start_matches('.'))
}

// Collapses repeated slashes and drops a leading one.
fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && (out.is_empty() || out.ends_with('/')) {
            continue;
        }
        out.push(c);
    }
    out
}

/// Recover the snapshot time from a key listed under `prefix`
pub fn parse_snapshot_timestamp(key: &str, prefix: &str) -> Option<DateTime<Utc>> {
    let rest = key.strip_prefix(prefix)?;
    let stamp = rest.get(..TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn owner(kind: &str, name: &str) -> OwnerReference {
        OwnerReference {
            kind: kind.to_string(),
            name: name.to_string(),
            controller: Some(true),
        }
    }

    #[test]
    fn test_strip_generated_suffix() {
        assert_eq!(strip_generated_suffix("web-7d4b9c8f6-x2k9p"), "web");
        assert_eq!(strip_generated_suffix("postgres-0"), "postgres");
        assert_eq!(strip_generated_suffix("redis-master-12"), "redis-master");
        assert_eq!(strip_generated_suffix("report-28472910-kx7pq"), "report");
        assert_eq!(strip_generated_suffix("fluentd-x7k2p"), "fluentd");
        assert_eq!(strip_generated_suffix("nginx"), "nginx");
        assert_eq!(strip_generated_suffix("my-app"), "my-app");
    }

    #[test]
    fn test_strip_never_empties_name() {
        assert_eq!(strip_generated_suffix("0"), "0");
        assert_eq!(strip_generated_suffix("-0"), "-0");
        assert_eq!(strip_generated_suffix("x2k9p"), "x2k9p");
    }

    #[test]
    fn test_workload_name_from_owner() {
        let none = BTreeMap::new();
        assert_eq!(
            workload_name("mysql-0", &[owner("StatefulSet", "mysql")], &none),
            "mysql"
        );
        assert_eq!(
            workload_name("node-exporter-x7k2p", &[owner("DaemonSet", "node-exporter")], &none),
            "node-exporter"
        );

        let mut labels = BTreeMap::new();
        labels.insert(POD_TEMPLATE_HASH_LABEL.to_string(), "7d4b9c8f6".to_string());
        assert_eq!(
            workload_name("web-7d4b9c8f6-x2k9p", &[owner("ReplicaSet", "web-7d4b9c8f6")], &labels),
            "web"
        );
        assert_eq!(
            workload_name("api-5c6d7f8b9-q2w4r", &[owner("ReplicaSet", "api-5c6d7f8b9")], &none),
            "api"
        );

        assert_eq!(
            workload_name("report-28472910-kx7pq", &[owner("Job", "report-28472910")], &none),
            "report"
        );
        assert_eq!(
            workload_name("migrate-kx7pq", &[owner("Job", "migrate")], &none),
            "migrate"
        );
    }

    #[test]
    fn test_workload_name_without_owner() {
        assert_eq!(workload_name("etcd-0", &[], &BTreeMap::new()), "etcd");
        assert_eq!(workload_name("standalone", &[], &BTreeMap::new()), "standalone");
    }

    #[test]
    fn test_dedupe_segments() {
        assert_eq!(dedupe_segments("postgres-postgres"), "postgres");
        assert_eq!(dedupe_segments("app-db-app"), "app-db");
        assert_eq!(dedupe_segments("a--b"), "a-b");
        assert_eq!(dedupe_segments("zookeeper"), "zookeeper");
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(
            clean_name("monitoring", "monitoring-prometheus-prometheus"),
            "prometheus"
        );
        assert_eq!(clean_name("kafka", "kafka"), "kafka");
        assert_eq!(clean_name("prod", "Billing_DB"), "billing-db");
        assert_eq!(clean_name("prod", "__"), "unnamed");
    }

    fn ctx() -> PathContext {
        PathContext::new("db", "postgres", "prod", "postgres", "sql.gz")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 3, 5, 1, 2, 3).unwrap())
    }

    #[test]
    fn test_render_key() {
        let path = BackupPath::new("kubackup", "{namespace}/{name}/{timestamp}.{ext}");
        assert_eq!(
            path.render(&ctx()),
            "kubackup/prod/postgres/20240305T010203Z.sql.gz"
        );

        let flat = BackupPath::new("/backups/", "/{target}-{kind}-{timestamp}.{ext}");
        assert_eq!(flat.render(&ctx()), "backups/db-postgres-20240305T010203Z.sql.gz");

        let no_prefix = BackupPath::new("", "{namespace}//{name}/{timestamp}.{ext}");
        assert_eq!(no_prefix.render(&ctx()), "prod/postgres/20240305T010203Z.sql.gz");
    }

    #[test]
    fn test_snapshot_prefix() {
        let path = BackupPath::new("kubackup", "{namespace}/{name}/{timestamp}.{ext}");
        assert_eq!(path.snapshot_prefix(&ctx()), "kubackup/prod/postgres/");

        let flat = BackupPath::new("kubackup", "{namespace}-{name}-{timestamp}.{ext}");
        assert_eq!(flat.snapshot_prefix(&ctx()), "kubackup/prod-postgres-");
    }

    #[test]
    fn test_parse_snapshot_timestamp() {
        let path = BackupPath::new("kubackup", "{namespace}/{name}/{timestamp}.{ext}");
        let key = path.render(&ctx());
        let prefix = path.snapshot_prefix(&ctx());

        assert_eq!(parse_snapshot_timestamp(&key, &prefix), Some(ctx().timestamp));
        assert_eq!(parse_snapshot_timestamp("kubackup/prod/postgres/notes.txt", &prefix), None);
        assert_eq!(parse_snapshot_timestamp("other/20240305T010203Z.sql", &prefix), None);
    }

    #[test]
    fn test_snapshot_matcher_is_per_target() {
        let path = BackupPath::new("kubackup", "{namespace}/{name}/{target}/{timestamp}.{ext}");
        let db = path.snapshot_matcher(&ctx()).unwrap();
        let key = path.render(&ctx());

        assert!(db.matches(&key));
        assert_eq!(db.timestamp(&key), Some(ctx().timestamp));

        let auth = PathContext::new("auth-db", "postgres", "prod", "postgres", "sql.gz");
        let auth_key = path.render(&auth);
        assert_eq!(path.snapshot_prefix(&auth), "kubackup/prod/postgres/auth-db/");
        assert!(!db.matches(&auth_key));

        assert!(!db.matches("kubackup/prod/postgres/db/20240305T010203Z.tar.gz"));
        assert!(!db.matches("kubackup/prod/postgres/db/manual.sql.gz"));
        assert!(!db.matches("kubackup/prod/postgres/db/20240305T010203Z.sql.gz.bak"));
    }

    #[test]
    fn test_snapshot_matcher_escapes_literals() {
        let path = BackupPath::new("kubackup", "{target}.{timestamp}.{ext}");
        let matcher = path.snapshot_matcher(&ctx()).unwrap();
        assert!(matcher.matches("kubackup/db.20240305T010203Z.sql.gz"));
        assert!(!matcher.matches("kubackup/dbx20240305T010203Zxsql.gz"));
    }
}

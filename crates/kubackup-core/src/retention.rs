//! Snapshot retention planning

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use kubackup_stores::StoredObject;

use crate::config::RetentionConfig;
use crate::naming::SnapshotMatcher;

/// How many snapshots of a workload are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    /// Newest snapshots that are always kept (at least one)
    pub keep_last: usize,
    /// Snapshots younger than this are kept as well
    pub keep_days: Option<u32>,
}

impl RetentionPolicy {
    pub fn new(keep_last: usize) -> Self {
        Self {
            keep_last: keep_last.max(1),
            keep_days: None,
        }
    }

    pub fn with_keep_days(mut self, days: u32) -> Self {
        self.keep_days = Some(days);
        self
    }

    /// Policy from configuration, with an optional per-target override
    pub fn from_config(config: &RetentionConfig, keep_last_override: Option<usize>) -> Self {
        Self {
            keep_last: keep_last_override.unwrap_or(config.keep_last).max(1),
            keep_days: config.keep_days,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&RetentionConfig::default(), None)
    }
}

/// A listed object with its resolved snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub key: String,
    pub size: Option<u64>,
    pub taken_at: DateTime<Utc>,
}

/// Outcome of applying a policy to a listing
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetentionPlan {
    /// Snapshots to keep, newest first
    pub keep: Vec<Snapshot>,
    /// Snapshots to delete, newest first
    pub prune: Vec<Snapshot>,
    /// Objects whose time could not be determined; never deleted
    pub ignored: Vec<StoredObject>,
}

impl RetentionPlan {
    pub fn is_noop(&self) -> bool {
        self.prune.is_empty()
    }

    /// Total size of the snapshots marked for deletion, when known
    pub fn reclaimed_bytes(&self) -> u64 {
        self.prune.iter().filter_map(|s| s.size).sum()
    }
}

/// Decide which of a target's snapshots to keep and which to prune.
///
/// Only keys accepted by `matcher` are candidates; everything else in the
/// listing is ignored. The snapshot time comes from the key, or from the
/// backend's modification time when the key's stamp is not a valid date.
pub fn plan(
    objects: Vec<StoredObject>,
    matcher: &SnapshotMatcher,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> RetentionPlan {
    let mut snapshots = Vec::with_capacity(objects.len());
    let mut ignored = Vec::new();

    for object in objects {
        if !matcher.matches(&object.key) {
            ignored.push(object);
            continue;
        }
        let taken_at = matcher.timestamp(&object.key).or(object.last_modified);
        match taken_at {
            Some(taken_at) => snapshots.push(Snapshot {
                key: object.key,
                size: object.size,
                taken_at,
            }),
            None => ignored.push(object),
        }
    }

    snapshots.sort_by(|a, b| b.taken_at.cmp(&a.taken_at).then_with(|| b.key.cmp(&a.key)));

    let keep_last = policy.keep_last.max(1);
    let cutoff = policy
        .keep_days
        .map(|days| now - Duration::days(i64::from(days)));

    let mut plan = RetentionPlan {
        ignored,
        ..Default::default()
    };

    for (index, snapshot) in snapshots.into_iter().enumerate() {
        let recent = cutoff.is_some_and(|cutoff| snapshot.taken_at > cutoff);
        if index < keep_last || recent {
            plan.keep.push(snapshot);
        } else {
            plan.prune.push(snapshot);
        }
    }

    debug!(
        keep = plan.keep.len(),
        prune = plan.prune.len(),
        ignored = plan.ignored.len(),
        "retention planned"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::naming::{BackupPath, PathContext};

    const PREFIX: &str = "kubackup/prod/postgres/db/";

    fn matcher() -> SnapshotMatcher {
        BackupPath::new("kubackup", "{namespace}/{name}/{target}/{timestamp}.{ext}")
            .snapshot_matcher(&PathContext::new("db", "postgres", "prod", "postgres", "sql.gz"))
            .unwrap()
    }

    fn object(day: u32) -> StoredObject {
        StoredObject {
            key: format!("{}202403{:02}T000000Z.sql.gz", PREFIX, day),
            size: Some(100),
            last_modified: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    fn keys(snapshots: &[Snapshot]) -> Vec<&str> {
        snapshots
            .iter()
            .map(|s| s.key.trim_start_matches(PREFIX))
            .collect()
    }

    #[test]
    fn test_keep_last() {
        let objects = vec![object(3), object(1), object(5), object(4), object(2)];
        let result = plan(objects, &matcher(), &RetentionPolicy::new(2), now());

        assert_eq!(
            keys(&result.keep),
            vec!["20240305T000000Z.sql.gz", "20240304T000000Z.sql.gz"]
        );
        assert_eq!(result.prune.len(), 3);
        assert_eq!(result.prune[0].key, object(3).key);
        assert_eq!(result.reclaimed_bytes(), 300);
    }

    #[test]
    fn test_keep_days_extends_keep_last() {
        let objects = vec![object(19), object(18), object(10), object(1)];
        let policy = RetentionPolicy::new(1).with_keep_days(5);
        let result = plan(objects, &matcher(), &policy, now());

        assert_eq!(result.keep.len(), 2);
        assert_eq!(
            keys(&result.prune),
            vec!["20240310T000000Z.sql.gz", "20240301T000000Z.sql.gz"]
        );
    }

    #[test]
    fn test_fewer_than_keep_last() {
        let result = plan(vec![object(1), object(2)], &matcher(), &RetentionPolicy::new(7), now());
        assert!(result.is_noop());
        assert_eq!(result.keep.len(), 2);
    }

    #[test]
    fn test_empty_listing() {
        let result = plan(Vec::new(), &matcher(), &RetentionPolicy::new(1), now());
        assert!(result.is_noop());
        assert!(result.keep.is_empty());
    }

    #[test]
    fn test_unparseable_objects_are_ignored() {
        let mut stray = StoredObject::new(format!("{}README", PREFIX));
        stray.size = Some(10);
        let objects = vec![object(1), object(2), stray.clone()];

        let result = plan(objects, &matcher(), &RetentionPolicy::new(1), now());
        assert_eq!(result.ignored, vec![stray]);
        assert_eq!(result.prune.len(), 1);
    }

    #[test]
    fn test_falls_back_to_last_modified() {
        let mut odd = StoredObject::new(format!("{}20241399T000000Z.sql.gz", PREFIX));
        odd.last_modified = Some(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());

        let result = plan(vec![object(1), odd.clone()], &matcher(), &RetentionPolicy::new(1), now());
        assert_eq!(result.keep[0].key, odd.key);
        assert_eq!(result.prune[0].key, object(1).key);
    }

    #[test]
    fn test_other_targets_are_never_pruned() {
        let mut foreign = vec![
            StoredObject::new("kubackup/prod/postgres/auth-db/20240301T000000Z.sql.gz"),
            StoredObject::new(format!("{}20240302T000000Z.tar.gz", PREFIX)),
            StoredObject::new("kubackup/prod/postgres/db-old/20240303T000000Z.sql.gz"),
        ];
        for object in &mut foreign {
            object.last_modified = Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        }
        let mut objects = foreign.clone();
        objects.push(object(10));

        let result = plan(objects, &matcher(), &RetentionPolicy::new(1), now());
        assert!(result.prune.is_empty());
        assert_eq!(keys(&result.keep), vec!["20240310T000000Z.sql.gz"]);
        assert_eq!(result.ignored, foreign);
    }

    #[test]
    fn test_keep_last_zero_keeps_one() {
        let policy = RetentionPolicy {
            keep_last: 0,
            keep_days: None,
        };
        let result = plan(vec![object(1), object(2)], &matcher(), &policy, now());
        assert_eq!(result.keep.len(), 1);
    }

    #[test]
    fn test_from_config_override() {
        let config = RetentionConfig {
            keep_last: 7,
            keep_days: Some(30),
        };
        let policy = RetentionPolicy::from_config(&config, Some(3));
        assert_eq!(policy.keep_last, 3);
        assert_eq!(policy.keep_days, Some(30));
    }
}

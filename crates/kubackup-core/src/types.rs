//! Core types for kubackup

use serde::{Deserialize, Serialize};

use crate::config::TargetConfig;

/// What kind of data a target exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    /// PostgreSQL dump (`pg_dumpall` / `pg_dump`)
    Postgres,
    /// MySQL / MariaDB dump (`mysqldump`)
    Mysql,
    /// MongoDB archive (`mongodump --archive`)
    Mongodb,
    /// Tarball of paths inside the container
    Files,
    /// etcd snapshot (`etcdctl snapshot save`)
    Etcd,
    /// Tarball of a ZooKeeper data directory
    Zookeeper,
}

impl BackupKind {
    /// Returns the string representation of the backup kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mongodb => "mongodb",
            Self::Files => "files",
            Self::Etcd => "etcd",
            Self::Zookeeper => "zookeeper",
        }
    }

    /// All kinds, in documentation order
    pub fn all() -> &'static [BackupKind] {
        &[
            Self::Postgres,
            Self::Mysql,
            Self::Mongodb,
            Self::Files,
            Self::Etcd,
            Self::Zookeeper,
        ]
    }

    /// File extension of the uncompressed dump
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Postgres | Self::Mysql => "sql",
            Self::Mongodb => "archive",
            Self::Files | Self::Zookeeper => "tar",
            Self::Etcd => "db",
        }
    }

    /// Shell command run inside the container; the dump is read from its stdout
    pub fn default_command(&self, target: &TargetConfig) -> std::result::Result<String, String> {
        let database = target.database.as_deref().map(shell_quote);

        let command = match self {
            Self::Postgres => match database {
                Some(db) => format!(
                    "PGPASSWORD=\"${{PGPASSWORD:-$POSTGRES_PASSWORD}}\" pg_dump --clean --if-exists --create -U \"${{POSTGRES_USER:-postgres}}\" {}",
                    db
                ),
                None => "PGPASSWORD=\"${PGPASSWORD:-$POSTGRES_PASSWORD}\" pg_dumpall --clean --if-exists -U \"${POSTGRES_USER:-postgres}\"".to_string(),
            },
            Self::Mysql => format!(
                "MYSQL_PWD=\"${{MYSQL_PWD:-$MYSQL_ROOT_PASSWORD}}\" mysqldump -uroot --single-transaction --routines --events {}",
                database.unwrap_or_else(|| "--all-databases".to_string())
            ),
            Self::Mongodb => {
                let mut cmd = "mongodump --archive --quiet ${MONGO_INITDB_ROOT_USERNAME:+--username \"$MONGO_INITDB_ROOT_USERNAME\" --password \"$MONGO_INITDB_ROOT_PASSWORD\" --authenticationDatabase admin}".to_string();
                if let Some(db) = database {
                    cmd.push_str(" --db ");
                    cmd.push_str(&db);
                }
                cmd
            }
            Self::Files => {
                if target.paths.is_empty() {
                    return Err("files targets need at least one path".to_string());
                }
                let paths: Vec<String> = target.paths.iter().map(|p| shell_quote(p)).collect();
                format!("tar -cf - {}", paths.join(" "))
            }
            // Each run saves into its own mktemp directory so concurrent runs
            // against one pod never read each other's snapshot.
            Self::Etcd => "dir=$(mktemp -d) || exit 1; ETCDCTL_API=3 etcdctl snapshot save \"$dir/snapshot.db\" >/dev/null && cat \"$dir/snapshot.db\"; rc=$?; rm -rf \"$dir\"; exit $rc".to_string(),
            Self::Zookeeper => {
                let data_dir = target.data_dir.as_deref().unwrap_or("/data");
                format!("tar -cf - -C {} version-2", shell_quote(data_dir))
            }
        };

        Ok(command)
    }
}

impl std::fmt::Display for BackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackupKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "mongodb" | "mongo" => Ok(Self::Mongodb),
            "files" | "file" => Ok(Self::Files),
            "etcd" => Ok(Self::Etcd),
            "zookeeper" | "zk" => Ok(Self::Zookeeper),
            _ => Err(format!("Unknown backup kind: {}", s)),
        }
    }
}

/// Local compression applied to dumps before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// gzip (flate2)
    #[default]
    Gzip,
    /// Upload the raw dump
    None,
}

impl Compression {
    /// Extension suffix added to the dump extension
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Gzip => ".gz",
            Self::None => "",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gzip => write!(f, "gzip"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Quote a value for `sh -c`
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '='));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

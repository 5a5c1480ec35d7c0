//! Device identity.
//!
//! Every pushed bundle records which device wrote it. The id must be
//! stable across runs of the same installation.
//!
//! Resolution order for [`FallbackIdentity`]:
//! 1. Explicitly configured value (`device_id` in config)
//! 2. `FIELDSYNC_DEVICE_ID` environment variable
//! 3. `/etc/machine-id`, then `/var/lib/dbus/machine-id`
//! 4. SHA-256 of hostname, username, OS and architecture, shaped as a UUID

use std::path::PathBuf;
use std::sync::OnceLock;

use sha2::{Digest, Sha256};
use tracing::debug;

/// Environment variable overriding the device id.
pub const DEVICE_ID_ENV: &str = "FIELDSYNC_DEVICE_ID";

/// Source of a stable device id.
pub trait Identity: Send + Sync {
    fn device_id(&self) -> String;
}

/// A fixed device id.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub String);

impl Identity for StaticIdentity {
    fn device_id(&self) -> String {
        self.0.clone()
    }
}

/// Device id resolved through the fallback chain, computed once.
#[derive(Debug)]
pub struct FallbackIdentity {
    configured: Option<String>,
    env_key: Option<String>,
    machine_id_paths: Vec<PathBuf>,
    resolved: OnceLock<String>,
}

impl FallbackIdentity {
    /// Standard chain with an optional configured value on top.
    #[must_use]
    pub fn new(configured: Option<String>) -> Self {
        Self {
            configured,
            env_key: Some(DEVICE_ID_ENV.to_string()),
            machine_id_paths: vec![
                PathBuf::from("/etc/machine-id"),
                PathBuf::from("/var/lib/dbus/machine-id"),
            ],
            resolved: OnceLock::new(),
        }
    }

    /// Chain with custom sources (no environment lookup when `env_key` is `None`).
    #[must_use]
    pub fn with_sources(
        configured: Option<String>,
        env_key: Option<String>,
        machine_id_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            configured,
            env_key,
            machine_id_paths,
            resolved: OnceLock::new(),
        }
    }

    fn resolve(&self) -> String {
        if let Some(id) = non_empty(self.configured.as_deref()) {
            debug!("Device id from configuration");
            return id;
        }

        if let Some(key) = &self.env_key {
            if let Ok(value) = std::env::var(key) {
                if let Some(id) = non_empty(Some(&value)) {
                    debug!(env = %key, "Device id from environment");
                    return id;
                }
            }
        }

        for path in &self.machine_id_paths {
            if let Ok(content) = std::fs::read_to_string(path) {
                if let Some(id) = non_empty(Some(&content)) {
                    debug!(path = %path.display(), "Device id from machine id");
                    return as_uuid(&id);
                }
            }
        }

        debug!("Device id derived from host fingerprint");
        fingerprint_id()
    }
}

impl Default for FallbackIdentity {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Identity for FallbackIdentity {
    fn device_id(&self) -> String {
        self.resolved.get_or_init(|| self.resolve()).clone()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reformat a 32-hex machine id as a hyphenated UUID; other ids pass through.
fn as_uuid(id: &str) -> String {
    uuid::Uuid::try_parse(id).map_or_else(|_| id.to_string(), |u| u.hyphenated().to_string())
}

fn fingerprint_id() -> String {
    let hostname = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .unwrap_or_default();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    fingerprint(
        hostname.trim(),
        &user,
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}

fn fingerprint(hostname: &str, user: &str, os: &str, arch: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [hostname, user, os, arch] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::analyzers::biome::BiomeVariant;
use crate::utils::fs::find_upwards;
use crate::utils::process::{self, Invocation};

const VERSION_TARGET: &str = "editguard::analyzers::version";

const PACKAGE_NAMES: &[&str] = &["@biomejs/biome"];

const DEPENDENCY_TABLES: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl std::fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Extracts the first `major[.minor[.patch]]` from free text such as
/// `^1.8.3`, `>=2.0`, `v1.8.3` or `Version: 2.1.0`.
pub fn parse_version(raw: &str) -> Option<ToolVersion> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("version pattern is valid")
    });
    let caps = pattern.captures(raw)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(ToolVersion {
        major: caps[1].parse().ok()?,
        minor: part(2),
        patch: part(3),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    Override,
    Manifest,
    Cli,
    Default,
}

impl std::fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionSource::Override => write!(f, "configuration override"),
            DetectionSource::Manifest => write!(f, "package.json"),
            DetectionSource::Cli => write!(f, "--version output"),
            DetectionSource::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    pub variant: BiomeVariant,
    pub source: DetectionSource,
    pub version: Option<ToolVersion>,
}

/// Decides which Biome variant to drive: configuration override, then the
/// project manifest, then `biome --version`, then the newest variant.
/// A successful probe is remembered until [`VersionResolver::clear`].
pub struct VersionResolver {
    binary: String,
    probe_timeout: Duration,
    detected: Mutex<Option<ResolvedVersion>>,
}

impl VersionResolver {
    pub fn new(binary: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            probe_timeout,
            detected: Mutex::new(None),
        }
    }

    #[allow(dead_code)]
    pub fn clear(&self) {
        *self.detected.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub async fn resolve(&self, project_hint: &Path, override_version: Option<&str>) -> ResolvedVersion {
        if let Some(raw) = override_version {
            match parse_version(raw).and_then(|v| BiomeVariant::from_major(v.major).map(|b| (v, b))) {
                Some((version, variant)) => {
                    return ResolvedVersion {
                        variant,
                        source: DetectionSource::Override,
                        version: Some(version),
                    }
                }
                None => warn!(
                    target: VERSION_TARGET,
                    value = raw,
                    "ignoring unusable biome version override"
                ),
            }
        }

        if let Some(cached) = *self.detected.lock().unwrap_or_else(|e| e.into_inner()) {
            return cached;
        }

        let probed = match self.probe_manifest(project_hint) {
            Some(found) => Some(found),
            None => self.probe_cli().await,
        };

        match probed {
            Some(found) => {
                debug!(
                    target: VERSION_TARGET,
                    variant = %found.variant,
                    source = %found.source,
                    "detected biome version"
                );
                *self.detected.lock().unwrap_or_else(|e| e.into_inner()) = Some(found);
                found
            }
            None => {
                debug!(target: VERSION_TARGET, "biome version undetected, using newest");
                ResolvedVersion {
                    variant: BiomeVariant::NEWEST,
                    source: DetectionSource::Default,
                    version: None,
                }
            }
        }
    }

    fn probe_manifest(&self, project_hint: &Path) -> Option<ResolvedVersion> {
        let manifest = find_upwards(project_hint, "package.json")?;
        let content = std::fs::read_to_string(&manifest).ok()?;
        let declared = declared_version(&content)?;
        let version = parse_version(&declared)?;
        Some(ResolvedVersion {
            variant: BiomeVariant::from_major(version.major)?,
            source: DetectionSource::Manifest,
            version: Some(version),
        })
    }

    async fn probe_cli(&self) -> Option<ResolvedVersion> {
        let invocation = Invocation::new(&self.binary).arg("--version");
        let output = match tokio::time::timeout(self.probe_timeout, process::run(&invocation)).await {
            Ok(Ok(output)) if output.success() => output,
            Ok(Ok(output)) => {
                debug!(target: VERSION_TARGET, status = ?output.status, "version probe failed");
                return None;
            }
            Ok(Err(err)) => {
                debug!(target: VERSION_TARGET, error = %err, "version probe failed");
                return None;
            }
            Err(_) => {
                debug!(target: VERSION_TARGET, "version probe timed out");
                return None;
            }
        };
        let version = parse_version(&output.stdout)?;
        Some(ResolvedVersion {
            variant: BiomeVariant::from_major(version.major)?,
            source: DetectionSource::Cli,
            version: Some(version),
        })
    }
}

fn declared_version(manifest: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(manifest).ok()?;
    DEPENDENCY_TABLES
        .iter()
        .filter_map(|table| json.get(table))
        .flat_map(|deps| PACKAGE_NAMES.iter().filter_map(move |name| deps.get(name)))
        .find_map(|v| v.as_str().map(str::to_string))
}

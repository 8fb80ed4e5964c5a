//! Configuration for runvm.
//!
//! The file is a JSON object with PascalCase keys:
//!
//! ```json
//! {"Name": "KVM", "OriginalDiskPath": "/var/lib/libvirt/images/disk.img.orig",
//!  "NumCPU": 1, "DefaultMaxCpus": 2, "DefaultMaxMem": 256, "DefaultMem": 256,
//!  "Sha1Sum": ""}
//! ```
//!
//! Zero or empty fields fall back to built-in defaults when the configuration
//! is resolved. The resolved value is passed explicitly to every component.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::constants::{config_paths, envs, vm_defaults};
use crate::util;

/// Raw configuration as stored on disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Configuration {
    /// Hypervisor backend identifier (e.g. "KVM")
    pub name: String,
    pub original_disk_path: String,
    #[serde(rename = "NumCPU")]
    pub num_cpu: u32,
    pub default_max_cpus: u32,
    pub default_max_mem: u32,
    pub default_mem: u32,
    /// Expected SHA-1 of the golden image, hex encoded; empty disables the check
    pub sha1_sum: String,
    /// Hypervisor connection URI
    pub uri: String,
    /// Root directory for per-instance state
    pub run_dir: String,
}

/// Configuration with every default applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub backend: String,
    pub golden_image: PathBuf,
    pub num_cpus: u32,
    pub max_cpus: u32,
    pub memory_mib: u32,
    pub max_memory_mib: u32,
    pub sha1_sum: Option<String>,
    pub uri: String,
    pub run_dir: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Configuration::default().resolved()
    }
}

fn or_default(value: u32, default: u32) -> u32 {
    if value == 0 { default } else { value }
}

fn or_default_str(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

impl Configuration {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> RunvmResult<Self> {
        serde_json::from_str(text).map_err(|e| RunvmError::Config(format!("parse error: {e}")))
    }

    /// Apply defaults and ceilings.
    pub fn resolved(&self) -> ResolvedConfig {
        let max_cpus = or_default(self.default_max_cpus, vm_defaults::MAX_CPUS);
        let max_memory_mib = or_default(self.default_max_mem, vm_defaults::MAX_MEMORY_MIB);

        let mut num_cpus = or_default(self.num_cpu, vm_defaults::NUM_CPUS);
        if num_cpus > max_cpus {
            tracing::warn!(
                requested = num_cpus,
                max = max_cpus,
                "NumCPU exceeds DefaultMaxCpus, clamping"
            );
            num_cpus = max_cpus;
        }

        let mut memory_mib = or_default(self.default_mem, vm_defaults::MEMORY_MIB);
        if memory_mib > max_memory_mib {
            tracing::warn!(
                requested = memory_mib,
                max = max_memory_mib,
                "DefaultMem exceeds DefaultMaxMem, clamping"
            );
            memory_mib = max_memory_mib;
        }

        let sha1_sum = match self.sha1_sum.trim() {
            "" => None,
            sum => Some(sum.to_ascii_lowercase()),
        };

        ResolvedConfig {
            backend: or_default_str(&self.name, vm_defaults::BACKEND),
            golden_image: PathBuf::from(or_default_str(
                &self.original_disk_path,
                vm_defaults::GOLDEN_IMAGE,
            )),
            num_cpus,
            max_cpus,
            memory_mib,
            max_memory_mib,
            sha1_sum,
            uri: or_default_str(&self.uri, vm_defaults::CONNECT_URI),
            run_dir: PathBuf::from(or_default_str(&self.run_dir, vm_defaults::RUN_DIR)),
        }
    }
}

/// Locates and parses the configuration file.
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Search `$RUNVM_CONFIG`, then `<execdir>/hypervisor/config.json`,
    /// then `/etc/runvm/config.json`.
    pub fn new() -> Self {
        let mut candidates = Vec::new();

        if let Ok(path) = std::env::var(envs::RUNVM_CONFIG)
            && !path.is_empty()
        {
            candidates.push(PathBuf::from(path));
        }

        match util::exec_dir() {
            Ok(dir) => candidates.push(dir.join(config_paths::EXEC_RELATIVE)),
            Err(e) => tracing::debug!("Skipping executable-relative config: {}", e),
        }

        candidates.push(PathBuf::from(config_paths::SYSTEM));
        Self { candidates }
    }

    /// Search an explicit list of paths, in order.
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Load the first candidate that exists.
    ///
    /// A file that exists but does not parse is an error; it does not fall
    /// through to the next candidate.
    pub fn load(&self) -> RunvmResult<Configuration> {
        for candidate in &self.candidates {
            match std::fs::read_to_string(candidate) {
                Ok(text) => {
                    tracing::debug!(path = %candidate.display(), "Loading configuration");
                    return Configuration::from_json(&text).map_err(|e| {
                        RunvmError::Config(format!("{}: {e}", candidate.display()))
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(RunvmError::Config(format!(
                        "could not read {}: {e}",
                        candidate.display()
                    )));
                }
            }
        }

        let searched = self
            .candidates
            .iter()
            .map(|p| format!("  - {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n");
        Err(RunvmError::Config(format!(
            "configuration not found.\nSearched locations:\n{searched}"
        )))
    }

    /// Load and resolve in one step.
    pub fn load_resolved(&self) -> RunvmResult<ResolvedConfig> {
        self.load().map(|c| c.resolved())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a configuration from a single file.
pub fn load_from(path: &Path) -> RunvmResult<Configuration> {
    ConfigLoader::with_candidates(vec![path.to_path_buf()]).load()
}

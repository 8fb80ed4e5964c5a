use std::path::PathBuf;

use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::constants::envs;

mod tool;

pub use tool::{HostToolRunner, ToolOutput, ToolRunner};

/// Directory containing the running executable.
pub fn exec_dir() -> RunvmResult<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| RunvmError::Internal(format!("cannot resolve executable path: {e}")))?;
    let exe = exe.canonicalize().unwrap_or(exe);
    exe.parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| RunvmError::Internal(format!("{} has no parent", exe.display())))
}

/// Find a helper script shipped next to the runtime binary.
///
/// # Arguments
/// * `name` - File name of the helper (e.g., "netinfo.sh")
///
/// # Returns
/// * `Ok(PathBuf)` - Path to the found helper
/// * `Err(RunvmError::ToolNotFound)` - Helper not found in any expected location
pub fn find_helper(name: &str) -> RunvmResult<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(dir) = std::env::var(envs::RUNVM_HELPER_DIR)
        && !dir.is_empty()
    {
        candidates.push(PathBuf::from(dir).join(name));
    }

    if let Ok(dir) = exec_dir() {
        candidates.push(dir.join(name));
    }

    for candidate in &candidates {
        tracing::debug!("Finding helper {:?} in path: {:?}", name, candidate);
        if candidate.is_file() {
            tracing::debug!(helper = %candidate.display(), "Found helper");
            return Ok(candidate.clone());
        }
    }

    let locations = candidates
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    tracing::debug!("Helper '{}' not found.\nSearched locations:\n{}", name, locations);

    Err(RunvmError::ToolNotFound {
        tool: name.to_string(),
    })
}

/// Install a file-backed tracing subscriber.
pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();
}

/// Install a stderr tracing subscriber.
pub fn register_stderr_tracing(env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

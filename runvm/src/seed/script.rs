//! Workload launcher script run inside the guest's chroot.

use std::collections::BTreeMap;

use crate::runtime::VirtualMachineParams;
use crate::runtime::constants::guest;

/// Single-quote a word when it contains whitespace (or is empty).
///
/// Words without whitespace are returned unchanged.
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty() && !word.chars().any(char::is_whitespace) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Single-quote a word unless every character is shell-inert.
///
/// Used for data the shell must never interpret: environment values,
/// directories and mount paths.
pub fn shell_escape(word: &str) -> String {
    let inert = |c: char| c.is_ascii_alphanumeric() || "_-./=:,+%@".contains(c);
    if !word.is_empty() && word.chars().all(inert) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Join workload arguments into one shell command line.
pub fn render_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `/bin/sh` launcher: exports the environment, changes directory and execs
/// the workload with stdio on the app console.
#[derive(Debug, Clone, Default)]
pub struct LauncherScript {
    env: BTreeMap<String, String>,
    cwd: String,
    command: Option<String>,
}

impl LauncherScript {
    pub fn for_params(params: &VirtualMachineParams) -> Self {
        let command = if params.args.is_empty() {
            tracing::warn!(id = %params.id, "No workload arguments, launcher will only run setup");
            None
        } else {
            Some(render_command(&params.args))
        };

        Self {
            env: params.env.clone(),
            cwd: if params.cwd.is_empty() {
                "/".to_string()
            } else {
                params.cwd.clone()
            },
            command,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("#!/bin/sh\n");
        for (name, value) in &self.env {
            out.push_str(&format!("export {}={}\n", name, shell_escape(value)));
        }
        out.push_str(&format!("cd {}\n", shell_escape(&self.cwd)));
        if let Some(command) = &self.command {
            out.push_str(&format!(
                "exec {} > {} 2>&1\n",
                command,
                guest::APP_CONSOLE_DEVICE
            ));
        }
        out
    }
}

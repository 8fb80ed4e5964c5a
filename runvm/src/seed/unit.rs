//! One-shot systemd unit that runs the launcher after cloud-init.

use crate::runtime::constants::{filenames, guest};

#[derive(Debug, Clone)]
struct Section {
    name: &'static str,
    entries: Vec<(&'static str, String)>,
}

/// An INI-style systemd unit file.
#[derive(Debug, Clone)]
pub struct UnitFile {
    sections: Vec<Section>,
}

impl UnitFile {
    /// Unit that chroots into the container rootfs, runs the launcher, and
    /// powers the guest off once the launcher returns.
    pub fn workload() -> Self {
        let chroot_cmd = format!(
            "/usr/sbin/chroot {} /{}",
            guest::ROOT_MOUNT,
            filenames::LAUNCHER
        );

        Self {
            sections: vec![
                Section {
                    name: "Unit",
                    entries: vec![
                        ("Description", "Container workload".to_string()),
                        ("After", "cloud-init.service".to_string()),
                    ],
                },
                Section {
                    name: "Service",
                    entries: vec![
                        ("Type", "oneshot".to_string()),
                        ("ExecStart", chroot_cmd),
                        ("ExecStop", "/sbin/poweroff -f".to_string()),
                    ],
                },
                Section {
                    name: "Install",
                    entries: vec![("WantedBy", "multi-user.target".to_string())],
                },
            ],
        }
    }

    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|section| {
                let mut out = format!("[{}]\n", section.name);
                for (key, value) in &section.entries {
                    out.push_str(&format!("{key}={value}\n"));
                }
                out
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

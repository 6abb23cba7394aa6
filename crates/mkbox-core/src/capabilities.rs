//! Runtime detection of host support for sandbox construction
//!
//! Probes the running kernel so the CLI can explain up front why a
//! construction would fail, instead of failing halfway through.

use std::path::Path;

/// Detected host support for building a sandbox
#[derive(Debug, Clone)]
pub struct SystemCapabilities {
    /// Running as root (euid == 0)
    pub has_root: bool,
    /// Unprivileged user namespaces are available
    pub has_user_namespaces: bool,
    /// Value of /proc/sys/user/max_user_namespaces, if readable
    pub max_user_namespaces: Option<u64>,
    /// /proc is mounted, so the ID map control files are reachable
    pub has_proc: bool,
}

impl SystemCapabilities {
    /// Detect all available capabilities on the current system
    pub fn detect() -> Self {
        Self {
            has_root: detect_root(),
            has_user_namespaces: detect_user_namespaces(),
            max_user_namespaces: read_max_user_namespaces(),
            has_proc: Path::new("/proc/self/uid_map").exists(),
        }
    }

    /// Check if a sandbox can be built at all on this host
    pub fn can_build_sandbox(&self) -> bool {
        self.has_proc && (self.has_root || self.has_user_namespaces)
    }

    /// Get a human-readable summary of capabilities
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        let check = |available: bool| if available { "[ok]" } else { "[--]" };

        lines.push(format!("{} Root privileges", check(self.has_root)));
        lines.push(format!(
            "{} User namespaces",
            check(self.has_user_namespaces)
        ));
        lines.push(format!("{} /proc ID map files", check(self.has_proc)));
        if let Some(max) = self.max_user_namespaces {
            lines.push(format!("     max_user_namespaces = {}", max));
        }

        lines.join("\n")
    }
}

fn detect_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn read_max_user_namespaces() -> Option<u64> {
    std::fs::read_to_string("/proc/sys/user/max_user_namespaces")
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn detect_user_namespaces() -> bool {
    // Debian/Ubuntu knob
    if let Ok(content) = std::fs::read_to_string("/proc/sys/kernel/unprivileged_userns_clone")
        && content.trim() == "0"
    {
        return false;
    }

    if let Some(max) = read_max_user_namespaces() {
        return max > 0;
    }

    true
}

//! Hardware and OS descriptors used as fingerprint input.

use std::path::Path;

/// Files that may hold a stable machine identifier, in preference order.
const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// File holding the configured host name.
const HOSTNAME_PATH: &str = "/etc/hostname";

/// File holding the running kernel release.
const OS_RELEASE_PATH: &str = "/proc/sys/kernel/osrelease";

/// A source of device descriptors.
///
/// Implementations return whatever identifying strings the platform exposes.
/// An empty list means no descriptor is available and the caller must fall
/// back to a synthetic identifier.
pub trait DescriptorSource: Send + Sync {
    /// Collect the available descriptors in a fixed order.
    fn descriptors(&self) -> Vec<String>;
}

/// Descriptors read from the local host.
///
/// Collects the machine id, host name and kernel release. OS and
/// architecture names are appended only when at least one identifying
/// descriptor was found, since on their own they identify nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDescriptors;

impl HostDescriptors {
    fn read_trimmed(path: &Path) -> Option<String> {
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl DescriptorSource for HostDescriptors {
    fn descriptors(&self) -> Vec<String> {
        let mut out = Vec::new();

        if let Some(id) = MACHINE_ID_PATHS
            .iter()
            .find_map(|p| Self::read_trimmed(Path::new(p)))
        {
            out.push(id);
        }
        if let Some(host) = Self::read_trimmed(Path::new(HOSTNAME_PATH)) {
            out.push(host);
        }
        if let Some(release) = Self::read_trimmed(Path::new(OS_RELEASE_PATH)) {
            out.push(release);
        }

        if !out.is_empty() {
            out.push(std::env::consts::OS.to_string());
            out.push(std::env::consts::ARCH.to_string());
        }
        out
    }
}

/// A fixed descriptor list supplied by the embedding application.
///
/// Mobile hosts pass the device id, brand, model and similar values they
/// obtain from platform APIs.
#[derive(Debug, Clone, Default)]
pub struct StaticDescriptors(pub Vec<String>);

impl DescriptorSource for StaticDescriptors {
    fn descriptors(&self) -> Vec<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_descriptors_passthrough() {
        let source = StaticDescriptors(vec!["pixel".into(), "14".into()]);
        assert_eq!(source.descriptors(), vec!["pixel", "14"]);
    }

    #[test]
    fn test_host_descriptors_os_arch_only_with_identifier() {
        let descriptors = HostDescriptors.descriptors();
        if !descriptors.is_empty() {
            assert!(descriptors.len() >= 3);
            assert_eq!(
                descriptors.last().map(String::as_str),
                Some(std::env::consts::ARCH)
            );
        }
    }
}

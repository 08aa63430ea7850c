use crate::error::VersionError;
use crate::module::Module;
use std::fmt;
use std::str::FromStr;

/// A WASI ABI snapshot.
///
/// Ordered oldest first; [`Version::Latest`] sorts last and stands for the
/// newest supported snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    Snapshot0,
    Snapshot1,
    Latest,
}

impl Version {
    /// Concrete snapshots, oldest first.
    pub const SNAPSHOTS: [Version; 2] = [Version::Snapshot0, Version::Snapshot1];

    /// Resolves `Latest` to the snapshot it stands for.
    pub fn resolve(self) -> Version {
        match self {
            Version::Latest => Version::Snapshot1,
            other => other,
        }
    }

    /// The import namespace guest modules use for this snapshot.
    pub fn namespace(self) -> &'static str {
        match self.resolve() {
            Version::Snapshot0 => "wasi_unstable",
            _ => "wasi_snapshot_preview1",
        }
    }

    /// Numeric codes used by the scripting bindings: 1 latest, 2 snapshot0,
    /// 3 snapshot1.
    pub fn from_code(code: u8) -> Result<Version, VersionError> {
        match code {
            1 => Ok(Version::Latest),
            2 => Ok(Version::Snapshot0),
            3 => Ok(Version::Snapshot1),
            other => Err(VersionError::Unsupported(format!("version code {other}"))),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Version::Latest => 1,
            Version::Snapshot0 => 2,
            Version::Snapshot1 => 3,
        }
    }

    /// The snapshot whose namespace `namespace` starts with, if any.
    fn classify(namespace: &str) -> Option<Version> {
        Self::SNAPSHOTS
            .iter()
            .rev()
            .copied()
            .find(|version| namespace.starts_with(version.namespace()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Version::Snapshot0 => "snapshot0",
            Version::Snapshot1 => "snapshot1",
            Version::Latest => "latest",
        };
        f.write_str(name)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Version::Latest),
            "snapshot0" | "wasi_unstable" => Ok(Version::Snapshot0),
            "snapshot1" | "wasi_snapshot_preview1" => Ok(Version::Snapshot1),
            other => Err(VersionError::Unsupported(other.to_string())),
        }
    }
}

/// Detects which WASI snapshot a module was built against.
///
/// With `strict`, a module importing from more than one snapshot is
/// rejected; otherwise the newest snapshot found wins.
pub fn get_version(module: &Module, strict: bool) -> Result<Version, VersionError> {
    let mut found: Vec<(Version, &str)> = Vec::new();
    for import in module.imports() {
        if let Some(version) = Version::classify(&import.module) {
            if !found.iter().any(|(v, _)| *v == version) {
                found.push((version, import.module.as_str()));
            }
        }
    }

    if strict && found.len() > 1 {
        let mut namespaces: Vec<String> = found.iter().map(|(_, ns)| ns.to_string()).collect();
        namespaces.sort();
        return Err(VersionError::Ambiguous { namespaces });
    }

    let version = found
        .iter()
        .map(|(version, _)| *version)
        .max()
        .ok_or(VersionError::NotWasi)?;
    tracing::debug!(%version, strict, "detected wasi version");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_sorts_last_and_resolves_to_snapshot1() {
        assert!(Version::Snapshot0 < Version::Snapshot1);
        assert!(Version::Snapshot1 < Version::Latest);
        assert_eq!(Version::Latest.resolve(), Version::Snapshot1);
        assert_eq!(Version::Latest.namespace(), "wasi_snapshot_preview1");
        assert_eq!(Version::Snapshot0.namespace(), "wasi_unstable");
    }

    #[test]
    fn codes_round_trip() {
        for version in [Version::Latest, Version::Snapshot0, Version::Snapshot1] {
            assert_eq!(Version::from_code(version.code()), Ok(version));
        }
        assert!(matches!(
            Version::from_code(9),
            Err(VersionError::Unsupported(_))
        ));
    }

    #[test]
    fn parse_names_and_namespaces() {
        assert_eq!("snapshot0".parse::<Version>(), Ok(Version::Snapshot0));
        assert_eq!("wasi_snapshot_preview1".parse::<Version>(), Ok(Version::Snapshot1));
        assert_eq!("latest".parse::<Version>(), Ok(Version::Latest));
        assert_eq!(
            "preview2".parse::<Version>(),
            Err(VersionError::Unsupported("preview2".to_string()))
        );
    }

    #[test]
    fn classify_matches_by_prefix() {
        assert_eq!(
            Version::classify("wasi_snapshot_preview1"),
            Some(Version::Snapshot1)
        );
        assert_eq!(Version::classify("wasi_unstable"), Some(Version::Snapshot0));
        assert_eq!(Version::classify("env"), None);
    }
}

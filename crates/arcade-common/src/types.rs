//! Core domain types used throughout the arcade launcher.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Base file name of an executable, used for name-based process matching.
///
/// Comparison is case-insensitive: `Foo.EXE` and `foo.exe` name the same image.
///
/// # Example
/// ```
/// use arcade_common::ImageName;
///
/// let image = ImageName::from_path("/games/Foo.exe");
/// assert_eq!(image.as_str(), "Foo.exe");
/// assert!(image.matches("foo.exe"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageName(String);

impl ImageName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the image name from a launch path.
    ///
    /// Falls back to the whole path string when it has no file name component
    /// (e.g. `..`), so the result is never empty for a non-empty path.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a process or file name.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for ImageName {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for ImageName {}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry key for an idle monitor.
///
/// Monitors are indexed by the OS process identifier. A launch whose spawn
/// yielded no identifier still gets a monitor, keyed by a launcher-local
/// sequence number instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorKey {
    Pid(u32),
    Detached(u64),
}

impl MonitorKey {
    pub fn pid(&self) -> Option<u32> {
        match self {
            MonitorKey::Pid(pid) => Some(*pid),
            MonitorKey::Detached(_) => None,
        }
    }
}

impl fmt::Display for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorKey::Pid(pid) => write!(f, "pid:{}", pid),
            MonitorKey::Detached(seq) => write!(f, "detached:{}", seq),
        }
    }
}

/// One launched executable.
///
/// Created at launch time and never reused for a different launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Path the executable was launched from.
    pub path: PathBuf,
    /// Base file name used for name-based matching.
    pub image_name: ImageName,
    /// Identifier of the directly-spawned process, if the OS returned one.
    pub pid: Option<u32>,
}

impl ProcessRecord {
    pub fn new(path: impl Into<PathBuf>, pid: Option<u32>) -> Self {
        let path = path.into();
        let image_name = ImageName::from_path(&path);
        Self {
            path,
            image_name,
            pid,
        }
    }

    pub fn path_display(&self) -> String {
        self.path.display().to_string()
    }
}

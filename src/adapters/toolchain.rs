//! Discovery of the ffmpeg/ffprobe transcoding toolchain.
//!
//! A local build under the data directory takes precedence over binaries
//! found on `PATH`. Installing the toolchain is left to the user.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// Where the toolchain was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainLocation {
    /// Local build in the data directory
    Local(PathBuf),
    /// System install found on `PATH`
    System(PathBuf),
    /// Not installed
    Missing,
}

impl ToolchainLocation {
    /// Directory to hand to the downloader, if any
    pub fn directory(&self) -> Option<&Path> {
        match self {
            Self::Local(dir) | Self::System(dir) => Some(dir),
            Self::Missing => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::System(_) => "system",
            Self::Missing => "missing",
        }
    }
}

/// Locates ffmpeg and ffprobe
#[derive(Debug, Clone)]
pub struct Toolchain {
    builds_dir: PathBuf,
}

impl Toolchain {
    /// `builds_dir` is where a local build would live
    pub fn new(builds_dir: impl Into<PathBuf>) -> Self {
        Self {
            builds_dir: builds_dir.into(),
        }
    }

    /// Find the toolchain, preferring a working local build
    pub fn locate(&self) -> ToolchainLocation {
        if self.local_build_works() {
            debug!(dir = %self.builds_dir.display(), "Using local ffmpeg build");
            return ToolchainLocation::Local(self.builds_dir.clone());
        }

        match (which::which(FFMPEG), which::which(FFPROBE)) {
            (Ok(ffmpeg), Ok(_)) => {
                let dir = ffmpeg
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                debug!(dir = %dir.display(), "Using system ffmpeg");
                ToolchainLocation::System(dir)
            }
            _ => ToolchainLocation::Missing,
        }
    }

    fn local_build_works(&self) -> bool {
        [FFMPEG, FFPROBE].iter().all(|name| {
            let binary = self.builds_dir.join(executable_name(name));
            // A corrupted binary fails to spawn
            binary.is_file()
                && Command::new(&binary)
                    .args(["-hide_banner", "-L"])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .is_ok()
        })
    }
}

fn executable_name(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_local_build_is_not_used() {
        let temp = TempDir::new().unwrap();
        let toolchain = Toolchain::new(temp.path().join("ffmpeg_builds"));

        // Whatever PATH holds, an empty builds dir never yields Local
        assert!(!matches!(toolchain.locate(), ToolchainLocation::Local(_)));
    }

    #[test]
    fn test_half_installed_local_build_is_not_used() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(executable_name(FFMPEG)), b"").unwrap();

        let toolchain = Toolchain::new(temp.path());
        assert!(!toolchain.local_build_works());
    }

    #[test]
    fn test_location_directory() {
        let dir = PathBuf::from("/opt/ffmpeg");
        assert_eq!(
            ToolchainLocation::Local(dir.clone()).directory(),
            Some(dir.as_path())
        );
        assert_eq!(ToolchainLocation::Missing.directory(), None);
        assert_eq!(ToolchainLocation::Missing.label(), "missing");
    }
}

//! Target platform resolution and host package prerequisites.
//!
//! Platforms form a closed set behind one capability surface: which
//! architectures they can be provisioned for, which host packages a build
//! needs, and how those packages are installed. Resolution from name strings
//! happens once, before anything touches the filesystem.

mod arch;

pub use arch::Arch;

use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Operating-system platforms a build environment can be provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
  Linux,
  Windows,
  MacOs,
}

impl Platform {
  /// Every supported platform.
  pub const ALL: [Platform; 3] = [Platform::Linux, Platform::Windows, Platform::MacOs];

  /// Detect the host platform at runtime.
  ///
  /// Returns `None` if the host OS is not a supported platform.
  pub fn host() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "windows" => Some(Self::Windows),
      "macos" => Some(Self::MacOs),
      _ => None,
    }
  }

  /// Look up a platform by its name string.
  pub fn by_name(name: &str) -> Option<Self> {
    match name {
      "linux" => Some(Self::Linux),
      "windows" => Some(Self::Windows),
      "macos" | "macosx" | "darwin" => Some(Self::MacOs),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this platform.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Windows => "windows",
      Self::MacOs => "macos",
    }
  }

  /// Architectures this platform can be provisioned for.
  pub fn supported_architectures(&self) -> &'static [Arch] {
    match self {
      Self::Linux => &[Arch::X86_64, Arch::I386, Arch::Aarch64],
      Self::Windows => &[Arch::X86_64, Arch::I386],
      Self::MacOs => &[Arch::X86_64, Arch::Aarch64],
    }
  }

  /// Package manager used to install host prerequisites.
  pub fn package_manager(&self) -> PackageManager {
    match self {
      Self::Linux => match LinuxFamily::detect() {
        Some(LinuxFamily::Rhel) => PackageManager::Dnf,
        _ => PackageManager::Apt,
      },
      // MSYS2 toolchains on Windows
      Self::Windows => PackageManager::Pacman,
      Self::MacOs => PackageManager::Brew,
    }
  }

  /// Host packages a provisioning run expects to be installed.
  ///
  /// On Linux the list depends on the distribution family; an unrecognized
  /// distribution yields an empty list and the caller proceeds without
  /// prerequisite installation.
  pub fn prerequisites(&self, arch: Arch) -> &'static [&'static str] {
    match self {
      Self::Linux => match LinuxFamily::detect() {
        Some(family) => linux_prerequisites(family),
        None => &[],
      },
      Self::Windows => match arch {
        Arch::X86_64 => &[
          "git",
          "make",
          "mingw-w64-x86_64-gcc",
          "mingw-w64-x86_64-yasm",
          "mingw-w64-x86_64-ninja",
          "mingw-w64-x86_64-make",
          "mingw-w64-x86_64-cmake",
          "mingw-w64-x86_64-qt5",
        ],
        Arch::I386 => &[
          "git",
          "make",
          "mingw-w64-i686-gcc",
          "mingw-w64-i686-yasm",
          "mingw-w64-i686-ninja",
          "mingw-w64-i686-make",
          "mingw-w64-i686-cmake",
          "mingw-w64-i686-qt5",
        ],
        Arch::Aarch64 => &[],
      },
      Self::MacOs => &["git", "yasm", "make", "ninja", "cmake", "qt@5"],
    }
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Host packages for one Linux distribution family.
pub fn linux_prerequisites(family: LinuxFamily) -> &'static [&'static str] {
  match family {
    LinuxFamily::Debian => &[
      "git",
      "gcc",
      "g++",
      "yasm",
      "pkg-config",
      "libtool",
      "autogen",
      "autoconf",
      "cmake",
      "make",
      "ninja-build",
      "libz-dev",
      "libbz2-dev",
      "liblz4-dev",
      "qtbase5-dev",
    ],
    LinuxFamily::Rhel => &[
      "git",
      "gcc",
      "gcc-c++",
      "yasm",
      "pkgconfig",
      "libtool",
      "autogen",
      "autoconf",
      "cmake",
      "make",
      "ninja-build",
      "zlib-devel",
      "bzip2-devel",
      "lz4-devel",
      "qt5-qtbase-devel",
      "qt5-linguist",
    ],
  }
}

/// Linux distribution families with distinct package naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinuxFamily {
  Debian,
  Rhel,
}

impl LinuxFamily {
  /// Detect the distribution family from `/etc/os-release`.
  pub fn detect() -> Option<Self> {
    let contents = fs::read_to_string("/etc/os-release").ok()?;
    Self::from_os_release(&contents)
  }

  fn from_os_release(contents: &str) -> Option<Self> {
    for line in contents.lines() {
      let value = match line.strip_prefix("ID=").or_else(|| line.strip_prefix("ID_LIKE=")) {
        Some(v) => v.trim_matches('"'),
        None => continue,
      };
      for id in value.split_whitespace() {
        match id {
          "debian" | "ubuntu" => return Some(Self::Debian),
          "rhel" | "fedora" | "centos" => return Some(Self::Rhel),
          _ => {}
        }
      }
    }
    None
  }
}

/// Host package managers used for prerequisite installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
  Apt,
  Dnf,
  Pacman,
  Brew,
}

impl PackageManager {
  /// Command line that installs one package without prompting.
  pub fn install_argv(&self, package: &str) -> Vec<String> {
    let base: &[&str] = match self {
      Self::Apt => &["apt-get", "install", "-y"],
      Self::Dnf => &["dnf", "install", "-y"],
      Self::Pacman => &["pacman", "-S", "--noconfirm"],
      Self::Brew => &["brew", "install"],
    };
    base
      .iter()
      .map(|t| t.to_string())
      .chain([package.to_string()])
      .collect()
  }
}

/// A platform with one of its architectures bound, for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTarget {
  platform: Platform,
  arch: Arch,
}

impl BuildTarget {
  /// Resolve a platform name and an architecture name to a concrete target.
  ///
  /// Pure lookup: no side effects on failure or success.
  pub fn resolve(platform_name: &str, arch_name: &str) -> Result<Self, ConfigError> {
    let platform = Platform::by_name(platform_name)
      .ok_or_else(|| ConfigError::UnsupportedPlatform(platform_name.to_string()))?;

    let arch = platform
      .supported_architectures()
      .iter()
      .copied()
      .find(|a| a.as_str() == arch_name)
      .ok_or_else(|| ConfigError::UnsupportedArchitecture {
        platform: platform_name.to_string(),
        arch: arch_name.to_string(),
      })?;

    Ok(Self { platform, arch })
  }

  pub fn platform(&self) -> Platform {
    self.platform
  }

  pub fn arch(&self) -> Arch {
    self.arch
  }

  /// Default install prefix every dependency installs into.
  ///
  /// Later steps discover earlier steps' headers and libraries under this
  /// path, so it is the same for the whole run.
  pub fn install_prefix(&self) -> PathBuf {
    match (self.platform, self.arch) {
      (Platform::Windows, Arch::I386) => PathBuf::from("/mingw32"),
      (Platform::Windows, _) => PathBuf::from("/mingw64"),
      _ => PathBuf::from("/usr/local"),
    }
  }
}

impl fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.arch, self.platform)
  }
}

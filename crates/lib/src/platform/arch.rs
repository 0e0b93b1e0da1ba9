use std::fmt;

/// CPU architecture variants a build environment can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86_64,
  I386,
  Aarch64,
}

impl Arch {
  /// Detect the host CPU architecture at runtime.
  ///
  /// Returns `None` if the host architecture is not a supported target.
  pub fn host() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "x86" => Some(Self::I386),
      "aarch64" => Some(Self::Aarch64),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::I386 => "i386",
      Self::Aarch64 => "aarch64",
    }
  }

  /// Pointer width of the target, in bits.
  pub fn bits(&self) -> u32 {
    match self {
      Self::X86_64 | Self::Aarch64 => 64,
      Self::I386 => 32,
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

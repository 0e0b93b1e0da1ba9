//! buildenv: provision the native third-party toolchain.
//!
//! `buildenv [PLATFORM] [ARCH] [BUILD_SYSTEM]` resolves the target, claims a
//! fresh `build_<platform>_env` directory next to the caller, and builds
//! every dependency of the table in order into the target's shared install
//! prefix. The run stops at the first failing step.

use anyhow::Result;
use clap::Parser;
use owo_colors::{OwoColorize, Stream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use buildenv_lib::buildsys::BuildSystem;
use buildenv_lib::exec::ProcessRunner;
use buildenv_lib::platform::{Arch, Platform};
use buildenv_lib::request::BuildRequest;
use buildenv_lib::source::HttpArchiveFetcher;

/// Provision the native dependency toolchain into a shared install prefix
#[derive(Parser)]
#[command(name = "buildenv", version, about, long_about = None)]
struct Cli {
  /// Target platform (defaults to the host OS)
  platform: Option<String>,

  /// Target architecture (defaults to the host architecture)
  arch: Option<String>,

  /// Build system driving CMake-based dependencies (ninja, make, gmake)
  build_system: Option<String>,

  /// Install host package prerequisites before building
  #[arg(long)]
  with_prereqs: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  let platform = cli.platform.unwrap_or_else(host_platform_name);
  let arch = cli.arch.unwrap_or_else(host_arch_name);
  let build_system = cli
    .build_system
    .as_deref()
    .map(BuildSystem::parse)
    .transpose()?;

  let request = BuildRequest::new(&platform, &arch, format!("build_{platform}_env"))?;
  debug!(%platform, %arch, root = %request.root().display(), "build request created");

  status(&format!(
    "provisioning {}/{} into {}",
    platform,
    arch,
    request.target().install_prefix().display()
  ));

  let mut runner = ProcessRunner;

  if cli.with_prereqs {
    status("installing host prerequisites");
    request.install_prerequisites(&mut runner, print_line)?;
  }

  request.build(&mut runner, &mut HttpArchiveFetcher, build_system, print_line)?;

  status("build environment ready");
  Ok(())
}

fn status(message: &str) {
  println!(
    "{} {}",
    "::".if_supports_color(Stream::Stdout, |s| s.cyan()),
    message
  );
}

fn print_line(line: &str) {
  println!("{line}");
}

fn host_platform_name() -> String {
  Platform::host()
    .map(|p| p.as_str().to_string())
    .unwrap_or_else(|| std::env::consts::OS.to_string())
}

fn host_arch_name() -> String {
  Arch::host()
    .map(|a| a.as_str().to_string())
    .unwrap_or_else(|| std::env::consts::ARCH.to_string())
}

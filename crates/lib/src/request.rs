//! The ordered dependency-build pipeline.
//!
//! A [`BuildRequest`] owns a fresh build root and a resolved target, and
//! drives every entry of the dependency table through the same sequence:
//! fetch the source, configure it, build and install it into the shared
//! prefix. Steps run strictly one after another; the first failure stops the
//! run and carries the failing dependency's identity out with the error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::buildsys::BuildSystem;
use crate::deps::{self, DEPENDENCIES, DependencySpec, Recipe, RefSpec, Source};
use crate::error::{BuildError, ConfigError, StepError};
use crate::exec::{CmakePolicy, CmdLine, CommonPolicy, Runner};
use crate::platform::BuildTarget;
use crate::source::ArchiveFetcher;
use crate::workdir::Cwd;

/// Directory CMake-based dependencies are configured in, one level below
/// their source root.
const BUILD_SUBDIR: &str = "build_release";

/// A provisioning run: resolved target, fresh build root, fixed step order.
#[derive(Debug)]
pub struct BuildRequest {
  root: PathBuf,
  target: BuildTarget,
}

impl BuildRequest {
  /// Resolve the target and claim `dir` as the build root.
  ///
  /// Resolution happens first, so name errors leave the filesystem alone.
  /// Afterwards any existing directory at `dir` is deleted and recreated
  /// empty; a run never sees another run's leftovers. Callers must not point
  /// this at a directory holding unrelated data.
  pub fn new(
    platform_name: &str,
    arch_name: &str,
    dir: impl AsRef<Path>,
  ) -> Result<Self, BuildError> {
    let target = BuildTarget::resolve(platform_name, arch_name)?;

    let root = std::path::absolute(dir.as_ref())?;
    if root.parent().is_none() || (root.exists() && !root.is_dir()) {
      return Err(ConfigError::InvalidBuildRoot(root).into());
    }

    if root.exists() {
      fs::remove_dir_all(&root)?;
    }
    fs::create_dir_all(&root)?;

    info!(
      platform = target.platform().as_str(),
      arch = target.arch().as_str(),
      root = %root.display(),
      "build request created"
    );

    Ok(Self { root, target })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn target(&self) -> &BuildTarget {
    &self.target
  }

  /// The working directory the next command would run in.
  ///
  /// Steps derive sub-directories from this value and pass them to the
  /// runner explicitly, so between steps (and after a failed step) this is
  /// always the build root.
  pub fn cwd(&self) -> Cwd {
    Cwd::new(&self.root)
  }

  /// Install host package prerequisites through the platform's package
  /// manager.
  pub fn install_prerequisites<R: FnMut(&str)>(
    &self,
    runner: &mut dyn Runner,
    mut report: R,
  ) -> Result<(), BuildError> {
    let platform = self.target.platform();
    let manager = platform.package_manager();
    let cwd = self.cwd();

    for &package in platform.prerequisites(self.target.arch()) {
      info!(package, "installing prerequisite");
      let argv = manager.install_argv(package);
      runner
        .run(&argv, cwd.path(), &mut CommonPolicy::new(&mut report))
        .map_err(|source| BuildError::Prerequisite {
          package: package.to_string(),
          source,
        })?;
    }

    Ok(())
  }

  /// Run the full dependency pipeline.
  ///
  /// Builds every table entry in order with the given build system (ninja if
  /// unspecified), streaming all sub-process output through `report`. Stops
  /// at the first failing step; there is no retry and no skipping.
  pub fn build<R: FnMut(&str)>(
    &self,
    runner: &mut dyn Runner,
    archives: &mut dyn ArchiveFetcher,
    build_system: Option<BuildSystem>,
    mut report: R,
  ) -> Result<(), BuildError> {
    let bs = build_system.unwrap_or_default();
    let prefix = self.target.install_prefix();

    // Shared templates. CMake dependencies configure from an isolated build
    // directory one level below their source root, hence the ".." source
    // argument.
    let cmake_line = CmdLine::new(["cmake", "..", bs.generator_arg(), "-DCMAKE_BUILD_TYPE=RELEASE"])
      .with_args([format!("-DCMAKE_INSTALL_PREFIX={}", prefix.display())]);
    let install_line = CmdLine::new(bs.command()).with_args(["install"]);

    let root = self.cwd();
    let total = DEPENDENCIES.len();

    for (index, dep) in DEPENDENCIES.iter().enumerate() {
      info!(step = index + 1, total, dependency = dep.name, "building dependency");
      self
        .build_dependency(runner, archives, dep, &cmake_line, &install_line, &prefix, &root, &mut report)
        .map_err(|source| BuildError::Step {
          dependency: dep.name,
          index,
          source,
        })?;
    }

    info!(prefix = %prefix.display(), "build environment ready");
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  fn build_dependency<R: FnMut(&str)>(
    &self,
    runner: &mut dyn Runner,
    archives: &mut dyn ArchiveFetcher,
    dep: &DependencySpec,
    cmake_line: &CmdLine,
    install_line: &CmdLine,
    prefix: &Path,
    root: &Cwd,
    report: &mut R,
  ) -> Result<(), StepError> {
    let src = self.fetch_source(runner, archives, dep, root, report)?;

    match dep.recipe {
      Recipe::Cmake { flags, source_subdir } => {
        let src = match source_subdir {
          Some(sub) => src.enter(sub),
          None => src,
        };
        let build_dir = src.create_enter(BUILD_SUBDIR)?;

        let configure = cmake_line.with_args(flags.iter().map(|f| deps::render_prefix(f, prefix)));
        runner.run(
          configure.tokens(),
          build_dir.path(),
          &mut CmakePolicy::new(&mut *report),
        )?;
        runner.run(
          install_line.tokens(),
          build_dir.path(),
          &mut CommonPolicy::new(&mut *report),
        )?;
      }
      Recipe::Autotools {
        bootstrap,
        configure_flags,
      } => {
        let bootstrap_line = CmdLine::new(["sh", bootstrap]);
        runner.run(
          bootstrap_line.tokens(),
          src.path(),
          &mut CommonPolicy::new(&mut *report),
        )?;

        let configure = CmdLine::new(["./configure"])
          .with_args([format!("--prefix={}", prefix.display())])
          .with_args(configure_flags.iter().copied());
        runner.run(
          configure.tokens(),
          src.path(),
          &mut CommonPolicy::new(&mut *report),
        )?;

        let install = CmdLine::new(["make", "install"]);
        runner.run(
          install.tokens(),
          src.path(),
          &mut CommonPolicy::new(&mut *report),
        )?;
      }
      Recipe::Make { subdir, args } => {
        let src = match subdir {
          Some(sub) => src.enter(sub),
          None => src,
        };
        let make = CmdLine::new(["make"]).with_args(args.iter().map(|a| deps::render_prefix(a, prefix)));
        runner.run(make.tokens(), src.path(), &mut CommonPolicy::new(&mut *report))?;
      }
      Recipe::ConfigureScript { script, flags } => {
        let configure = CmdLine::new([script])
          .with_args([format!("--prefix={}", prefix.display())])
          .with_args(flags.iter().copied());
        runner.run(
          configure.tokens(),
          src.path(),
          &mut CommonPolicy::new(&mut *report),
        )?;

        let make = CmdLine::new(["make"]);
        runner.run(make.tokens(), src.path(), &mut CommonPolicy::new(&mut *report))?;

        let install = CmdLine::new(["make", "install"]);
        runner.run(install.tokens(), src.path(), &mut CommonPolicy::new(&mut *report))?;
      }
    }

    Ok(())
  }

  /// Retrieve a dependency's source tree into the build root and return the
  /// directory holding it.
  fn fetch_source<R: FnMut(&str)>(
    &self,
    runner: &mut dyn Runner,
    archives: &mut dyn ArchiveFetcher,
    dep: &DependencySpec,
    root: &Cwd,
    report: &mut R,
  ) -> Result<Cwd, StepError> {
    match dep.source {
      Source::Git { url, refspec } => {
        let dest = root.enter(dep.name);

        let mut argv: Vec<String> = ["git", "clone", "--depth", "1"]
          .iter()
          .map(|t| t.to_string())
          .collect();
        if let RefSpec::Pinned(rev) = refspec {
          argv.push("--branch".to_string());
          argv.push(rev.to_string());
        }
        argv.push(url.to_string());
        argv.push(dest.path().display().to_string());

        runner.run(&argv, root.path(), &mut CommonPolicy::new(&mut *report))?;
        Ok(dest)
      }
      Source::Archive { url } => {
        let dir = archives.fetch_and_unpack(url, root.path())?;
        Ok(Cwd::new(dir))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::rc::Rc;

  use tempfile::TempDir;

  use crate::exec::{CommandResult, ExecError, OutputPolicy};
  use crate::source::SourceError;

  /// One recorded collaborator call, in arrival order.
  #[derive(Debug, Clone)]
  enum Invocation {
    Command { argv: Vec<String>, cwd: PathBuf },
    Archive { url: String },
  }

  type Log = Rc<RefCell<Vec<Invocation>>>;

  /// Runner double: records every invocation, optionally failing the first
  /// one whose argv mentions a substring.
  struct RecordingRunner {
    log: Log,
    fail_when: Option<&'static str>,
  }

  impl Runner for RecordingRunner {
    fn run(
      &mut self,
      argv: &[String],
      cwd: &Path,
      _policy: &mut dyn OutputPolicy,
    ) -> Result<CommandResult, ExecError> {
      self.log.borrow_mut().push(Invocation::Command {
        argv: argv.to_vec(),
        cwd: cwd.to_path_buf(),
      });

      if let Some(pattern) = self.fail_when
        && argv.join(" ").contains(pattern)
      {
        return Err(ExecError::Failed {
          program: argv[0].clone(),
          code: Some(1),
        });
      }

      Ok(CommandResult { code: 0 })
    }
  }

  /// Archive double: records the URL and lays out a fake unpacked tree.
  struct StubArchives {
    log: Log,
  }

  impl ArchiveFetcher for StubArchives {
    fn fetch_and_unpack(&mut self, url: &str, dest: &Path) -> Result<PathBuf, SourceError> {
      self.log.borrow_mut().push(Invocation::Archive {
        url: url.to_string(),
      });
      let file_name = url.rsplit('/').next().unwrap();
      let dir = dest.join(file_name.trim_end_matches(".tar.gz"));
      fs::create_dir_all(&dir)?;
      Ok(dir)
    }
  }

  fn doubles(fail_when: Option<&'static str>) -> (RecordingRunner, StubArchives, Log) {
    let log: Log = Rc::default();
    (
      RecordingRunner {
        log: log.clone(),
        fail_when,
      },
      StubArchives { log: log.clone() },
      log,
    )
  }

  /// The source-acquisition URL of each step, in arrival order.
  fn acquisitions(log: &Log) -> Vec<String> {
    log
      .borrow()
      .iter()
      .filter_map(|inv| match inv {
        Invocation::Command { argv, .. } if argv.get(1).map(String::as_str) == Some("clone") => {
          argv.get(argv.len() - 2).cloned()
        }
        Invocation::Archive { url } => Some(url.clone()),
        _ => None,
      })
      .collect()
  }

  fn expected_acquisitions() -> Vec<String> {
    DEPENDENCIES
      .iter()
      .map(|d| match d.source {
        Source::Git { url, .. } => url.to_string(),
        Source::Archive { url } => url.to_string(),
      })
      .collect()
  }

  #[test]
  fn construction_recreates_an_existing_directory_empty() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("env");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("stale.txt"), "old run").unwrap();

    let request = BuildRequest::new("linux", "x86_64", &dir).unwrap();

    assert_eq!(request.root(), dir.as_path());
    assert!(dir.is_dir());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
  }

  #[test]
  fn resolution_failure_leaves_the_filesystem_alone() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("env");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("keep.txt"), "untouched").unwrap();

    let err = BuildRequest::new("amiga", "x86_64", &dir).unwrap_err();
    assert!(matches!(
      err,
      BuildError::Config(ConfigError::UnsupportedPlatform(_))
    ));
    assert!(dir.join("keep.txt").exists());

    let err = BuildRequest::new("linux", "m68k", &dir).unwrap_err();
    assert!(matches!(
      err,
      BuildError::Config(ConfigError::UnsupportedArchitecture { .. })
    ));
    assert!(dir.join("keep.txt").exists());
  }

  #[test]
  fn a_file_at_the_build_root_is_rejected_and_preserved() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("not-a-dir");
    fs::write(&file, "data").unwrap();

    let err = BuildRequest::new("linux", "x86_64", &file).unwrap_err();

    assert!(matches!(
      err,
      BuildError::Config(ConfigError::InvalidBuildRoot(_))
    ));
    assert!(file.exists());
  }

  #[test]
  fn pipeline_runs_all_steps_in_the_fixed_order() {
    let temp = TempDir::new().unwrap();
    let request = BuildRequest::new("linux", "x86_64", temp.path().join("env")).unwrap();
    let (mut runner, mut archives, log) = doubles(None);

    request
      .build(&mut runner, &mut archives, None, |_| {})
      .unwrap();

    assert_eq!(acquisitions(&log), expected_acquisitions());
  }

  #[test]
  fn pipeline_renders_prefix_flags_and_default_build_system() {
    let temp = TempDir::new().unwrap();
    let request = BuildRequest::new("linux", "x86_64", temp.path().join("env")).unwrap();
    let (mut runner, mut archives, log) = doubles(None);

    request
      .build(&mut runner, &mut archives, None, |_| {})
      .unwrap();

    let log = log.borrow();
    let commands: Vec<&Vec<String>> = log
      .iter()
      .filter_map(|inv| match inv {
        Invocation::Command { argv, .. } => Some(argv),
        _ => None,
      })
      .collect();

    // The placeholder never reaches a command line
    assert!(
      commands
        .iter()
        .all(|argv| argv.iter().all(|t| !t.contains("${prefix}")))
    );

    // Shared cmake template: generator, build type, shared prefix
    let cmake = commands
      .iter()
      .find(|argv| argv[0] == "cmake")
      .expect("a cmake invocation");
    assert!(cmake.contains(&"-GNinja".to_string()));
    assert!(cmake.contains(&"-DCMAKE_BUILD_TYPE=RELEASE".to_string()));
    assert!(cmake.contains(&"-DCMAKE_INSTALL_PREFIX=/usr/local".to_string()));

    // Default build system drives the install
    assert!(commands.iter().any(|argv| argv[..] == ["ninja", "install"]));

    // Per-dependency prefix flags are rendered with the real prefix
    assert!(
      commands
        .iter()
        .any(|argv| argv.contains(&"-DOPENSSL_ROOT_DIR=/usr/local".to_string()))
    );
    assert!(
      commands
        .iter()
        .any(|argv| argv[0] == "make" && argv.contains(&"PREFIX=/usr/local".to_string()))
    );
  }

  #[test]
  fn cmake_steps_configure_in_an_isolated_build_directory() {
    let temp = TempDir::new().unwrap();
    let request = BuildRequest::new("linux", "x86_64", temp.path().join("env")).unwrap();
    let (mut runner, mut archives, log) = doubles(None);

    request
      .build(&mut runner, &mut archives, None, |_| {})
      .unwrap();

    let log = log.borrow();
    let cwd_of = |needle: &str| -> PathBuf {
      log
        .iter()
        .find_map(|inv| match inv {
          Invocation::Command { argv, cwd } if argv[0] == "cmake" && cwd.to_string_lossy().contains(needle) => {
            Some(cwd.clone())
          }
          _ => None,
        })
        .unwrap_or_else(|| panic!("no cmake invocation under {needle}"))
    };

    assert!(cwd_of("snappy").ends_with("snappy/build_release"));
    // qscintilla configures from its Qt4Qt5 sub-tree
    assert!(cwd_of("qscintilla").ends_with("qscintilla/Qt4Qt5/build_release"));

    // lmdb builds in-place in its library sub-directory
    let lmdb_cwd = log
      .iter()
      .find_map(|inv| match inv {
        Invocation::Command { argv, cwd } if argv[0] == "make" && cwd.to_string_lossy().contains("lmdb") => {
          Some(cwd.clone())
        }
        _ => None,
      })
      .unwrap();
    assert!(lmdb_cwd.ends_with("lmdb/libraries/liblmdb"));

    // The openssl archive builds through its configure script
    assert!(log.iter().any(|inv| matches!(
      inv,
      Invocation::Command { argv, cwd }
        if argv[0] == "./config" && cwd.ends_with("openssl-1.1.1w")
    )));
  }

  #[test]
  fn first_failure_stops_the_pipeline_and_names_the_dependency() {
    let temp = TempDir::new().unwrap();
    let request = BuildRequest::new("linux", "x86_64", temp.path().join("env")).unwrap();
    // libssh2 is step 3; its clone is the first command mentioning it
    let (mut runner, mut archives, log) = doubles(Some("libssh2"));

    let err = request
      .build(&mut runner, &mut archives, Some(BuildSystem::Ninja), |_| {})
      .unwrap_err();

    match err {
      BuildError::Step {
        dependency, index, ..
      } => {
        assert_eq!(dependency, "libssh2");
        assert_eq!(index, 2);
      }
      other => panic!("unexpected error: {other}"),
    }

    // Steps 1 and 2 ran, steps 4..14 never started
    assert_eq!(
      acquisitions(&log),
      expected_acquisitions()[..3].to_vec()
    );

    // The effective working directory is the build root again
    assert_eq!(request.cwd().path(), request.root());
    assert!(request.root().is_dir());
  }

  #[test]
  fn prerequisites_install_through_the_platform_package_manager() {
    let temp = TempDir::new().unwrap();
    let request = BuildRequest::new("windows", "x86_64", temp.path().join("env")).unwrap();
    let (mut runner, _, log) = doubles(None);

    request.install_prerequisites(&mut runner, |_| {}).unwrap();

    let log = log.borrow();
    let first = match &log[0] {
      Invocation::Command { argv, .. } => argv.clone(),
      other => panic!("unexpected invocation: {other:?}"),
    };
    assert_eq!(first, ["pacman", "-S", "--noconfirm", "git"]);
    assert_eq!(
      log.len(),
      request
        .target()
        .platform()
        .prerequisites(request.target().arch())
        .len()
    );
  }

  #[test]
  fn prerequisite_failure_names_the_package() {
    let temp = TempDir::new().unwrap();
    let request = BuildRequest::new("windows", "i386", temp.path().join("env")).unwrap();
    let (mut runner, _, _) = doubles(Some("mingw-w64-i686-yasm"));

    let err = request.install_prerequisites(&mut runner, |_| {}).unwrap_err();

    assert!(matches!(
      err,
      BuildError::Prerequisite { ref package, .. } if package == "mingw-w64-i686-yasm"
    ));
  }
}

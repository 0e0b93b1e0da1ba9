//! The static dependency table.
//!
//! Order is significant and fixed: each entry may rely on headers and
//! libraries that earlier entries installed into the shared prefix, so the
//! linear sequence is a flattened dependency graph. The compression and TLS
//! libraries come first, the common library needs everything before it, each
//! storage-engine client needs the common library, and the aggregate core
//! library comes last.

use std::path::Path;

/// Placeholder rendered with the shared install prefix at build time.
///
/// Keeping the prefix symbolic lets the table stay static data while flags
/// like `-DOPENSSL_ROOT_DIR=${prefix}` still point at the run's prefix.
pub const PREFIX_VAR: &str = "${prefix}";

/// Replace the prefix placeholder in one flag.
pub fn render_prefix(flag: &str, prefix: &Path) -> String {
  flag.replace(PREFIX_VAR, &prefix.display().to_string())
}

/// How a dependency's source ref is selected at clone time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefSpec {
  /// Clone a specific tag or branch.
  Pinned(&'static str),
  /// Track whatever the default branch currently points at.
  DefaultBranch,
}

/// Where a dependency's source tree comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  Git {
    url: &'static str,
    refspec: RefSpec,
  },
  /// Versioned release archive, built through its own configure script.
  Archive { url: &'static str },
}

/// How a dependency is configured and installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipe {
  /// CMake in an isolated release build directory.
  Cmake {
    /// Extra flags appended to the shared cmake line.
    flags: &'static [&'static str],
    /// Configure from this sub-directory of the source tree.
    source_subdir: Option<&'static str>,
  },
  /// Autotools in the source tree: bootstrap script, configure, make install.
  Autotools {
    bootstrap: &'static str,
    configure_flags: &'static [&'static str],
  },
  /// Plain make in the source tree (or a sub-directory of it).
  Make {
    subdir: Option<&'static str>,
    args: &'static [&'static str],
  },
  /// Configure script of an unpacked release archive, then make install.
  ConfigureScript {
    script: &'static str,
    flags: &'static [&'static str],
  },
}

/// One third-party library the pipeline provisions.
#[derive(Debug, Clone, Copy)]
pub struct DependencySpec {
  pub name: &'static str,
  pub source: Source,
  pub recipe: Recipe,
}

/// All dependencies, in build order.
pub const DEPENDENCIES: [DependencySpec; 14] = [
  DependencySpec {
    name: "snappy",
    source: Source::Git {
      url: "https://github.com/keystonedb/snappy.git",
      refspec: RefSpec::Pinned("v1.1.9"),
    },
    recipe: Recipe::Cmake {
      flags: &["-DBUILD_SHARED_LIBS=OFF", "-DSNAPPY_BUILD_TESTS=OFF"],
      source_subdir: None,
    },
  },
  DependencySpec {
    name: "openssl",
    source: Source::Archive {
      url: "https://www.openssl.org/source/openssl-1.1.1w.tar.gz",
    },
    recipe: Recipe::ConfigureScript {
      script: "./config",
      flags: &["no-shared"],
    },
  },
  DependencySpec {
    name: "libssh2",
    source: Source::Git {
      url: "https://github.com/keystonedb/libssh2.git",
      refspec: RefSpec::Pinned("v1.10.0"),
    },
    recipe: Recipe::Cmake {
      flags: &[
        "-DBUILD_SHARED_LIBS=OFF",
        "-DCRYPTO_BACKEND=OpenSSL",
        "-DENABLE_ZLIB_COMPRESSION=ON",
        "-DBUILD_EXAMPLES=OFF",
        "-DBUILD_TESTING=OFF",
        "-DOPENSSL_USE_STATIC_LIBS=ON",
        "-DZLIB_USE_STATIC=ON",
        "-DOPENSSL_ROOT_DIR=${prefix}",
      ],
      source_subdir: None,
    },
  },
  DependencySpec {
    name: "json-c",
    source: Source::Git {
      url: "https://github.com/keystonedb/json-c.git",
      refspec: RefSpec::Pinned("v0.16"),
    },
    recipe: Recipe::Autotools {
      bootstrap: "autogen.sh",
      configure_flags: &["--disable-shared", "--enable-static"],
    },
  },
  DependencySpec {
    name: "qscintilla",
    source: Source::Git {
      url: "https://github.com/keystonedb/qscintilla.git",
      refspec: RefSpec::Pinned("v2.13"),
    },
    recipe: Recipe::Cmake {
      flags: &[],
      source_subdir: Some("Qt4Qt5"),
    },
  },
  DependencySpec {
    name: "common",
    source: Source::Git {
      url: "https://github.com/keystonedb/common.git",
      refspec: RefSpec::Pinned("stable"),
    },
    recipe: Recipe::Cmake {
      flags: &[
        "-DQT_ENABLED=ON",
        "-DJSON_ENABLED=ON",
        "-DSNAPPY_USE_STATIC=ON",
      ],
      source_subdir: None,
    },
  },
  DependencySpec {
    name: "hiredis",
    source: Source::Git {
      url: "https://github.com/keystonedb/hiredis.git",
      refspec: RefSpec::Pinned("v1.0.2"),
    },
    recipe: Recipe::Make {
      subdir: None,
      args: &[
        "LIBSSH2_ENABLED=ON",
        "OPENSSL_ROOT_DIR=${prefix}",
        "PREFIX=${prefix}",
        "install",
      ],
    },
  },
  DependencySpec {
    name: "libmemcached",
    source: Source::Git {
      url: "https://github.com/keystonedb/libmemcached.git",
      refspec: RefSpec::Pinned("v1.0.18"),
    },
    recipe: Recipe::Autotools {
      bootstrap: "bootstrap.sh",
      configure_flags: &["--disable-shared", "--enable-static", "--enable-sasl"],
    },
  },
  DependencySpec {
    name: "unqlite",
    source: Source::Git {
      url: "https://github.com/keystonedb/unqlite.git",
      refspec: RefSpec::Pinned("v1.5"),
    },
    recipe: Recipe::Cmake {
      flags: &[],
      source_subdir: None,
    },
  },
  DependencySpec {
    name: "lmdb",
    source: Source::Git {
      url: "https://github.com/keystonedb/lmdb.git",
      refspec: RefSpec::Pinned("LMDB_0.9.29"),
    },
    recipe: Recipe::Make {
      subdir: Some("libraries/liblmdb"),
      args: &["install_static_lib", "prefix=${prefix}"],
    },
  },
  DependencySpec {
    name: "leveldb",
    source: Source::Git {
      url: "https://github.com/keystonedb/leveldb.git",
      refspec: RefSpec::Pinned("1.23"),
    },
    recipe: Recipe::Cmake {
      flags: &[
        "-DBUILD_SHARED_LIBS=OFF",
        "-DLEVELDB_BUILD_TESTS=OFF",
        "-DLEVELDB_BUILD_BENCHMARKS=OFF",
      ],
      source_subdir: None,
    },
  },
  DependencySpec {
    name: "rocksdb",
    source: Source::Git {
      url: "https://github.com/keystonedb/rocksdb.git",
      refspec: RefSpec::Pinned("v6.29.5"),
    },
    recipe: Recipe::Cmake {
      flags: &[
        "-DFAIL_ON_WARNINGS=OFF",
        "-DPORTABLE=ON",
        "-DWITH_TESTS=OFF",
        "-DWITH_SNAPPY=ON",
        "-DWITH_ZLIB=ON",
        "-DWITH_LZ4=ON",
        "-DROCKSDB_INSTALL_ON_WINDOWS=ON",
        "-DWITH_TOOLS=OFF",
        "-DWITH_GFLAGS=OFF",
        "-DBUILD_SHARED_LIBS=OFF",
      ],
      source_subdir: None,
    },
  },
  // forestdb has no stable release tag; its default branch is what upstream
  // supports, so it is intentionally unpinned.
  DependencySpec {
    name: "forestdb",
    source: Source::Git {
      url: "https://github.com/keystonedb/forestdb.git",
      refspec: RefSpec::DefaultBranch,
    },
    recipe: Recipe::Cmake {
      flags: &["-DBUILD_SHARED_LIBS=OFF"],
      source_subdir: None,
    },
  },
  // The aggregate core library evolves together with this tool and tracks
  // its default branch.
  DependencySpec {
    name: "keystone_core",
    source: Source::Git {
      url: "https://github.com/keystonedb/keystone_core.git",
      refspec: RefSpec::DefaultBranch,
    },
    recipe: Recipe::Cmake {
      flags: &[
        "-DJSONC_USE_STATIC=ON",
        "-DSNAPPY_USE_STATIC=ON",
        "-DOPENSSL_USE_STATIC_LIBS=ON",
      ],
      source_subdir: None,
    },
  },
];

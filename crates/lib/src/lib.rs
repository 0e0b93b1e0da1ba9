//! buildenv-lib: provisioning engine for the native dependency toolchain.
//!
//! This crate fetches and compiles the fixed set of third-party libraries a
//! workstation needs before the main application can be built, in dependency
//! order, into one shared install prefix:
//! - `platform`: target platform/architecture resolution and host prerequisites
//! - `buildsys`: native build-tool selection (ninja/make/gmake)
//! - `exec`: sub-process execution with streamed, classified output
//! - `source`: release-archive download and extraction
//! - `deps`: the static dependency table
//! - `request`: the ordered build pipeline

pub mod buildsys;
pub mod deps;
pub mod error;
pub mod exec;
pub mod platform;
pub mod request;
pub mod source;
pub mod workdir;

//! In-memory decoy namespace for honeyfs.
//!
//! [`Namespace`] is the single source of truth for which decoy files and
//! directories exist, what they contain, and what their metadata is. The
//! projection adapter and the control server both hold it behind an `Arc`
//! and never keep copies of node data.
//!
//! [`NamespaceBuilder`] populates a namespace at startup, either node by node
//! or from a JSON [`Manifest`].

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod builder;
pub mod namespace;

pub use builder::{Manifest, ManifestEntry, NamespaceBuilder};
pub use namespace::Namespace;

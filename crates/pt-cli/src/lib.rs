//! podtunnel: command-line interface
//!
//! Wires the kubectl collaborators into the forward and reverse session
//! sets and exposes them as the `podtunnel` binary.

pub mod commands;

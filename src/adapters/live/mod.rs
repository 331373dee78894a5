//! Live adapters that talk to real backends.

pub mod remote;

//! Utility functions for the demos: host-side interface setup.

pub mod network;

//! Integration test crate for FaceTrack.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on all facetrack library crates to verify they work together.

#[cfg(test)]
mod support;

#[cfg(test)]
mod tracking;

#[cfg(test)]
mod drift;

#[cfg(test)]
mod config;

//! Shared test utilities used across mergetree crates.
//!
//! Provides a tracing [`tracing::RecordingLayer`] for asserting
//! instrumentation, mesh [`meshes`] fixtures expressed as plain edge lists and
//! scalar values, and a sequential [`reference`] sweep that property tests
//! compare the parallel engine against.

pub mod meshes;
pub mod reference;
pub mod tracing;

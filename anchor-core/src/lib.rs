#![no_std]

#[cfg(test)]
extern crate std;

// Shared logic for the UWB anchor power-profiling harness.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware collaborators (radio driver, ranging stack,
// marker pins, busy-wait delay) are reached only through the traits declared
// here so the same state machine runs on the board and in the emulator.

pub mod channels;
pub mod config;
pub mod display;
pub mod harness;
pub mod input;
pub mod markers;
pub mod radio;
pub mod ranging;
pub mod repl;
pub mod sequences;
pub mod telemetry;
pub mod time;
pub mod transmit;

pub use harness::{AnchorState, TestHarness, TestMode};

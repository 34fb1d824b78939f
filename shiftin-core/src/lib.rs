#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Polling shift-in driver for parallel-load register chains.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Platforms plug in through the traits in [`lines`].

pub mod config;
pub mod console;
pub mod cycle;
pub mod driver;
pub mod lines;
pub mod telemetry;

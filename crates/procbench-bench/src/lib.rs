#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Benchmark harness for procbench.
//!
//! Run benchmarks with: `cargo bench -p procbench-bench`
//!
//! Covers the per-run and per-configuration aggregation paths, which run once
//! for every repetition of a sweep.

//! # Binary-Level Test Suite
//!
//! End-to-end runs of the updater against temporary calendar files, plus
//! command-line parsing checks.

mod cli_tests;

//! Kernel Unit Tests Module
//!
//! Cross-module tests for kernel subsystems, driven through the test
//! fixtures in `crate::testing`.

mod syscall_tests;

//! End-to-end tests of the model registry through the public API.

mod binding_tests;
mod collection_tests;
mod common;
mod lifecycle_tests;
mod managed_tests;

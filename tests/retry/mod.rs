//! Retry engine integration tests.

mod engine;
mod layer;

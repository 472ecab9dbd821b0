//! Recovery manager integration tests, wired through a [`safeguard::Resilience`].

mod strategies;

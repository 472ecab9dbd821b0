//! Error monitor integration tests: alert delivery, escalation and the
//! breach, resolve, re-breach cycle driven through protected calls.

mod escalation;

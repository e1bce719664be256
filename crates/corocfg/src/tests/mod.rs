//! Test suites exercising the client against the loopback transport.

mod behaviour;
mod concurrency;

//! Scenario modules. Each holds only `#[cfg(test)]` code.

pub mod correlation;
pub mod fan_out;
pub mod handshake;
pub mod shutdown;

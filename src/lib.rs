#![allow(clippy::collapsible_if)]

pub mod bridge;
pub mod config;
pub mod diagnostics;
pub mod language;
pub mod runtime;
pub mod wire;

#[cfg(test)]
mod tests;

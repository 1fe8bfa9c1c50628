//! Integration tests.

#[cfg(test)]
mod harness;

pub mod fanout;
pub mod image;

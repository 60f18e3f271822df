#![allow(dead_code)]

pub mod capabilities;
pub mod fixtures;

pub use capabilities::*;
pub use fixtures::*;

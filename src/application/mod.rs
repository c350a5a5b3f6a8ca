//! Application services layer: parameter codec, resolve pipeline and writes.

pub mod address;
pub mod catalog;
pub mod error;
pub mod logic;
pub mod mutations;
pub mod navigation;
pub mod params;
pub mod repos;
pub mod shell;
pub mod stream;

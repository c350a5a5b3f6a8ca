//! View models and askama templates.

pub mod products;
pub mod views;

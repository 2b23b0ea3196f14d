//! Pointcull - procedural point filtering and effect scalability culling

pub mod core;
pub mod math;
pub mod pcg;
pub mod scalability;

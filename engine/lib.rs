#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod data;
pub mod grid;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod reduce;

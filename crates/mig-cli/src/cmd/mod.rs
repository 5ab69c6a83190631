pub mod action;
pub mod config;
pub mod exec;
pub mod id;
pub mod keygen;
pub mod module;

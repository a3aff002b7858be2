pub mod adapters;
pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod ports;
pub mod protocol;

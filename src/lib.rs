#![deny(warnings)]

// Library crate for univer-fileserver

pub mod config;
pub mod error;
pub mod operations;
pub mod resolve;
pub mod routes;
pub mod server;
pub mod supervisor;

//! benchmatrix command-line front end, exposed as a library for testing

pub mod cli;
pub mod config;
pub mod output;

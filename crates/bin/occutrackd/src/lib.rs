//! Library half of `occutrackd`: configuration and the command protocol,
//! shared by the binary and its integration tests.

pub mod command;
pub mod config;

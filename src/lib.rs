//! pingsweep: send one ICMP echo request to each address of a list at a
//! fixed rate and report which addresses answered within a timeout.
pub mod cli;
pub mod config;
pub mod output;
pub mod scanner;
pub mod targets;

//! # proxwake-daemon
//!
//! Runtime pieces for the proxwake daemon: the BlueZ and simulated radios,
//! the UDP broadcast link, the read-only status endpoint, logging, and the
//! command-line interface.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod cli;
pub mod logging;
pub mod net;
pub mod radio;
pub mod state;

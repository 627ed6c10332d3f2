pub mod bag;
pub mod character;
pub mod cli;
pub mod clock;
pub mod config;
pub mod draw;
pub mod error;
pub mod history;
pub mod journal;
pub mod logging;
pub mod net;
pub mod protocol;
pub mod reveal;
pub mod scoring;
pub mod session;
pub mod status;
pub mod traits;
pub mod weather;

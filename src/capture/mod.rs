pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod flush;
pub mod io;
pub mod process;
pub mod relay;
pub mod sampler;
pub mod state;

#[cfg(feature = "tokio")]
pub mod tokio;

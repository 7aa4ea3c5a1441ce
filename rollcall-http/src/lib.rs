pub mod dto;
pub mod handlers;
pub mod server;

pub use server::{build_state, init_tracing, router, serve};

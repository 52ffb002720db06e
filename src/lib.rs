//! Creative Prompt API - three LLM-backed personas behind one HTTP service
//!
//! An inventor of imaginary tools, a translator of unspoken feelings and a
//! dream curator whose interpretations come with a generated image. Every
//! request and response is recorded in an expiring log store.

pub mod ai;
pub mod app;
pub mod dispatch;
pub mod error;
pub mod logs;
pub mod models;
pub mod persona;
pub mod pipeline;
pub mod prompts;
pub mod server;

pub use error::{Error, Result};

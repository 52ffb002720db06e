pub mod chat;
pub mod client;
pub mod image;
pub mod types;

pub use chat::OpenAiChatClient;
pub use image::OpenAiImageClient;

#[cfg(test)]
pub(crate) use client::test_support;

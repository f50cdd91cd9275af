mod client;
mod device_repository;
mod message_store;
mod migrate;

pub use client::*;
pub use device_repository::*;
pub use message_store::*;
pub use migrate::*;

mod device_resolver;
mod ingest_service;

pub use device_resolver::*;
pub use ingest_service::*;

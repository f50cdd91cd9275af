pub mod domain;
pub mod http;
pub mod live;
pub mod xml;

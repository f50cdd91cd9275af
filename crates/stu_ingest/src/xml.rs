mod response;
mod stream_parser;

pub use response::*;
pub use stream_parser::*;

mod listener;
mod live_ws;
mod router;

pub use listener::*;
pub use live_ws::*;
pub use router::*;

mod device;
mod live_update;
mod message;
mod report;
mod result;

pub use device::*;
pub use live_update::*;
pub use message::*;
pub use report::*;
pub use result::*;

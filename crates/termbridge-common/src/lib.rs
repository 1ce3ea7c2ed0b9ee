pub mod events;
pub mod id;

pub use events::{OutputChunk, SessionEvent};
pub use id::{new_id, SessionId};

//! Authorization service façade — actor and client handle

mod actor;

pub use actor::{AccessActor, AccessHandle};

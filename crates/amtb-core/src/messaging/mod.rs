//! Chat transport abstractions and the outbound delivery pipeline.

pub mod dispatcher;
pub mod port;
pub mod types;

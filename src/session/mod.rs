//! Upstream session abstractions.
//!
//! - [`StreamSession`] one attempt at consuming the upstream (`advance` / `close`)
//! - [`StreamFactory`] produces a fresh session per connect attempt
//! - [`StreamFn`] closure-backed factory over any `futures::Stream`
//! - [`Transformed`] factory adapter mapping each value

#[allow(clippy::module_inception)]
mod session;
mod stream_fn;
mod transform;

pub use session::{BoxSession, FactoryRef, StreamFactory, StreamSession};
pub use stream_fn::StreamFn;
pub use transform::Transformed;

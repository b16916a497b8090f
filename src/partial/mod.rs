mod partial;
mod payload;
mod scrunch;

pub use partial::{Partial, PrecinctBatch, Step};
pub use payload::Continuation;
pub use scrunch::{scrunch, unscrunch, Packed, Scrunched};

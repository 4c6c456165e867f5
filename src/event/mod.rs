pub mod model;
pub mod router;

pub use router::{EventRouter, Subscription};

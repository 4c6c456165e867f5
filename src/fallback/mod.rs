pub mod store;

pub use store::FallbackStore;

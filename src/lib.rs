pub mod event;
pub mod fallback;
pub mod integration;
pub mod message;
pub mod notify;
pub mod settings;
pub mod source;
pub mod state;
pub mod thread;
pub mod user;

pub use integration::model::Page;
pub use message::model::MessageDraft;
pub use settings::Config;
pub use state::ChatSync;

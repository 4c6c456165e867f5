use async_trait::async_trait;

use crate::integration::model::Page;
use crate::message::model::{Message, MessageDraft};
use crate::thread::model::Thread;
use crate::user::model::Participant;
use crate::{message, thread, user};

mod local;
mod remote;
mod supervisor;

pub use local::LocalDataSource;
pub use remote::RemoteDataSource;
pub use supervisor::{Mode, SourceSupervisor};

/// Capability surface shared by the authoritative backend path and the
/// local in-memory fallback. Which implementation is active at any moment
/// is the supervisor's call, never an implicit flag.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn list_threads(&self, viewer: &user::Id, page: &Page) -> thread::Result<Vec<Thread>>;

    async fn find_thread(&self, id: &thread::Id) -> thread::Result<Thread>;

    async fn create_thread(
        &self,
        creator: &user::Id,
        name: Option<String>,
        kind: thread::Kind,
        participants: Vec<Participant>,
    ) -> thread::Result<Thread>;

    async fn list_messages(&self, thread_id: &thread::Id) -> message::Result<Vec<Message>>;

    async fn find_message(&self, id: &message::Id) -> message::Result<Message>;

    /// Inserts a message and returns it along with the refreshed thread
    /// summary.
    async fn insert_message(
        &self,
        thread_id: &thread::Id,
        draft: &MessageDraft,
        sender: &user::Id,
    ) -> message::Result<(Thread, Message)>;

    async fn mark_read(
        &self,
        thread_id: &thread::Id,
        message_ids: &[message::Id],
        reader: &user::Id,
    ) -> message::Result<()>;

    async fn hide_message(&self, id: &message::Id, viewer: &user::Id) -> message::Result<()>;

    async fn redact_message(&self, id: &message::Id, sender: &user::Id) -> message::Result<()>;

    async fn search(
        &self,
        query: &str,
        viewer: &user::Id,
        thread_id: Option<&thread::Id>,
    ) -> message::Result<Vec<Message>>;
}

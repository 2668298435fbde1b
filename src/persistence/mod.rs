pub mod coordinator;
pub mod journal;
pub mod local;
pub mod remote;
pub mod supabase;

pub use coordinator::{PersistenceCoordinator, SyncOutcome, SyncPayload};
pub use journal::RunJournal;
pub use local::{LocalStore, MemoryLocalStore};
pub use remote::{MemoryRemoteStore, RemoteStore};
pub use supabase::SupabaseRemoteStore;

pub mod api;
mod engine;
pub mod env;
pub mod error;
mod util;

pub use api::auth::{ApiCredentials, TokenProvider};
pub use api::shelves::{ReadingShelfMembership, ShelfPrecondition};
pub use api::writer::{ProgressAck, ProgressWriter};
pub use engine::ProgressEngine;
pub use engine::options::ProgressOptions;
pub use engine::state::{BookId, ProgressState, parse_page_input};
pub use engine::status::{ProgressStatusData, WritePhase};
pub use engine::tasks::EngineTasks;
pub use util::listeners::CallbackListenerHandle;

//! Scribe engine: HTTP gateway, poll timer and durable storage.
mod engine;
mod gateway;
mod persist;
mod store;
mod types;

pub use engine::{EngineHandle, EngineSettings};
pub use gateway::{GatewaySettings, JobApi, ReqwestJobApi};
pub use persist::{ensure_state_dir, read_optional, AtomicFileWriter, PersistError};
pub use store::{Clock, Store, StoreError};
pub use types::{
    ApiError, ApiErrorKind, ArticleFailure, ArticleResult, EngineEvent, ImageAttachment, JobId,
    JobState, RetryAck, StatusSnapshot,
};

// Infrastructure layer modules
pub mod algolia;
pub mod api_error;
pub mod firestore_event;
pub mod index_handle;
pub mod logging;
pub mod sync_config;
pub mod trigger_server;

// Re-exports
pub use algolia::{AlgoliaConfig, AlgoliaConfigError, AlgoliaIndexClient};
pub use api_error::{ApiError, ApiErrorBody};
pub use firestore_event::{EventDecodeError, FirestoreDocument, FirestoreEvent, UpdateMask};
pub use index_handle::{IndexError, IndexHandle, IndexTask};
pub use logging::init_logging;
pub use sync_config::{SyncConfig, SyncConfigError};
pub use trigger_server::{SyncResponse, create_router};

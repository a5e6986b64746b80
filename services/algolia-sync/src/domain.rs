// Domain layer modules
pub mod change_event;
pub mod document_shape;
pub mod document_snapshot;
pub mod record;

// Re-exports
pub use change_event::{ChangeEvent, ChangeKind};
pub use document_shape::{DocumentShape, ParseShapePolicyError, ShapeError, ShapePolicy};
pub use document_snapshot::{DocumentSnapshot, Payload};
pub use record::{OBJECT_ID_FIELD, Record, RecordShaper};

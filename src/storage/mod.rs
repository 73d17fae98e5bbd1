pub mod layout;
pub mod merge;
pub mod segment;
pub mod wal;

pub use layout::StorageLayout;
pub use segment::{MutableSegment, Segment, SegmentId};

//! Segments: data model, boundary planning, and sources.

pub mod types;
pub mod plan;
pub mod source;

pub use types::{Segment, SegmentDescriptor, SegmentLocation, SegmentRole, SegmentSpan};
pub use plan::{plan_input_manifest, plan_segments};
pub use source::{FixedSizeSource, FragmentedDirSource, ListedSource, MemorySource, SegmentSource};

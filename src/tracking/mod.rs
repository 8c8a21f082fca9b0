//! The two tracking stages.
//!
//! This module provides:
//! - `link_all_frames` - frame-to-frame linking, one LAP per frame pair
//! - `split_into_segments` - linear track segments of a linkage graph
//! - `build_segment_candidates` - gap closing, splitting and merging candidates
//! - `link_segments` - the single segment-level LAP

mod frame_to_frame;
mod segments;
mod segment_costs;
mod segment_linker;

pub use frame_to_frame::{link_all_frames, link_frame_pair, FrameLink, LinkingThreshold};
pub use segments::{split_into_segments, TrackSegment};
pub use segment_costs::{build_segment_candidates, SegmentCandidates, SegmentSource, SegmentTarget};
pub use segment_linker::{link_segments, SegmentEvent, SegmentLink};

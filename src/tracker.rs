//! LAP tracker: drives the two linking stages and assembles the graph.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::progress::{CancelToken, ProgressLogger, TracingLogger};
use crate::settings::{LapSettings, Settings};
use crate::tracking::{build_segment_candidates, link_all_frames, link_segments, split_into_segments};
use crate::{CostMethod, Error, LinkageGraph, ObjectCollection, Result};

/// Where a tracker is in its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    ValidatingInput,
    FrameToFrameLinking,
    BuildingSegmentMatrix,
    SegmentSolving,
    AssemblingGraph,
    Done,
    /// Run failed with the given message.
    Failed(String),
    /// Run was canceled with the given reason.
    Canceled(String),
}

impl TrackerState {
    /// Whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerState::Done | TrackerState::Failed(_) | TrackerState::Canceled(_))
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerState::Idle => write!(f, "idle"),
            TrackerState::ValidatingInput => write!(f, "validating input"),
            TrackerState::FrameToFrameLinking => write!(f, "frame-to-frame linking"),
            TrackerState::BuildingSegmentMatrix => write!(f, "building segment cost matrix"),
            TrackerState::SegmentSolving => write!(f, "solving segment LAP"),
            TrackerState::AssemblingGraph => write!(f, "assembling graph"),
            TrackerState::Done => write!(f, "done"),
            TrackerState::Failed(msg) => write!(f, "failed: {}", msg),
            TrackerState::Canceled(reason) => write!(f, "canceled: {}", reason),
        }
    }
}

/// Sparse LAP tracker.
///
/// Links the objects of a collection into a weighted graph in two stages:
/// frame-to-frame linking, then one segment-level LAP for gap closing,
/// splitting and merging. A run either commits a complete graph or leaves
/// the previous result untouched.
pub struct SparseLapTracker {
    objects: ObjectCollection,
    settings: Settings,
    logger: Arc<dyn ProgressLogger>,
    num_threads: Option<usize>,
    cancel: CancelToken,
    state: TrackerState,
    graph: Option<LinkageGraph>,
    error_message: Option<String>,
}

impl SparseLapTracker {
    /// Create a tracker for the given objects and settings.
    ///
    /// Nothing is validated until `check_input` or `process` is called.
    pub fn new(objects: ObjectCollection, settings: Settings) -> Self {
        Self {
            objects,
            settings,
            logger: Arc::new(TracingLogger),
            num_threads: None,
            cancel: CancelToken::new(),
            state: TrackerState::Idle,
            graph: None,
            error_message: None,
        }
    }

    /// Use a custom progress logger.
    pub fn with_logger(mut self, logger: Arc<dyn ProgressLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Bound the worker pool size. Defaults to the available parallelism.
    pub fn set_num_threads(&mut self, num_threads: usize) {
        self.num_threads = Some(num_threads.max(1));
    }

    /// Shared cancellation token, usable from other threads.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn objects(&self) -> &ObjectCollection {
        &self.objects
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Message of the last failure or cancellation.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Graph committed by the last successful run.
    pub fn result(&self) -> Option<&LinkageGraph> {
        self.graph.as_ref()
    }

    /// Request cancellation of the current or next run.
    ///
    /// Cancellation is sticky: reset the token to run again.
    pub fn cancel(&self, reason: &str) {
        self.cancel.cancel(reason);
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel.reason()
    }

    /// Validate settings and input objects.
    ///
    /// On failure the message is available from `error_message`.
    pub fn check_input(&mut self) -> bool {
        self.state = TrackerState::ValidatingInput;
        match self.validate() {
            Ok(_) => {
                self.state = TrackerState::Idle;
                self.error_message = None;
                true
            }
            Err(e) => {
                let msg = e.to_string();
                self.state = TrackerState::Failed(msg.clone());
                self.error_message = Some(msg);
                false
            }
        }
    }

    fn validate(&self) -> Result<LapSettings> {
        let settings = LapSettings::from_settings(&self.settings)?;
        if settings.linking.method == CostMethod::Overlap {
            let shapeless = self.objects.iter().filter(|o| !o.has_shape()).count();
            if shapeless > 0 {
                warn!(shapeless, "objects without outline or radius can never link by overlap");
            }
        }
        Ok(settings)
    }

    /// Run both stages.
    ///
    /// # Returns
    /// `true` if a new graph was committed. On failure or cancellation the
    /// previous result is kept and `error_message` describes the outcome.
    pub fn process(&mut self) -> bool {
        self.error_message = None;
        info!(
            objects = self.objects.len(),
            frames = self.objects.n_frames(),
            "starting LAP tracking"
        );

        match self.run() {
            Ok(graph) => {
                info!(
                    vertices = graph.vertex_count(),
                    edges = graph.edge_count(),
                    "LAP tracking done"
                );
                self.graph = Some(graph);
                self.state = TrackerState::Done;
                self.logger.set_progress(1.0);
                self.logger.set_status("Done.");
                true
            }
            Err(Error::Canceled(reason)) => {
                warn!(reason = %reason, "LAP tracking canceled");
                self.error_message = Some(format!("Canceled: {}", reason));
                self.state = TrackerState::Canceled(reason);
                false
            }
            Err(e) => {
                let msg = e.to_string();
                warn!(error = %msg, "LAP tracking failed");
                self.error_message = Some(msg.clone());
                self.state = TrackerState::Failed(msg);
                false
            }
        }
    }

    fn run(&mut self) -> Result<LinkageGraph> {
        self.state = TrackerState::ValidatingInput;
        let settings = self.validate()?;
        self.cancel.check()?;

        let num_threads = self
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("sparselap-{}", i))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        debug!(num_threads, "worker pool ready");

        self.state = TrackerState::FrameToFrameLinking;
        self.logger.set_status("Frame to frame linking...");
        let objects = &self.objects;
        let cancel = &self.cancel;
        let logger = self.logger.as_ref();
        let frame_links = pool.install(|| link_all_frames(objects, &settings.linking, cancel, logger))?;

        self.logger.log(&format!("Frame to frame linking: {} links.", frame_links.len()));

        let mut graph = LinkageGraph::new();
        for object in self.objects.iter() {
            graph.add_vertex(object.id, object.frame);
        }
        for link in &frame_links {
            graph.add_edge(link.source, link.target, link.cost)?;
        }

        if settings.segments.any_enabled() {
            self.state = TrackerState::BuildingSegmentMatrix;
            self.logger.set_status("Creating the segment linking cost matrix...");
            let segments = split_into_segments(&graph);
            let segment_settings = &settings.segments;
            let candidates =
                pool.install(|| build_segment_candidates(&segments, objects, segment_settings))?;
            debug!(
                segments = segments.len(),
                candidates = candidates.total(),
                "segment matrix built"
            );
            self.logger.set_progress(0.75);

            self.cancel.check()?;
            self.state = TrackerState::SegmentSolving;
            self.logger.set_status("Solving for segments...");
            let links = match &candidates.candidates {
                Some(c) => link_segments(c)?,
                None => Vec::new(),
            };

            self.logger.log(&format!(
                "Segment linking: {} segments, {} candidates, {} links.",
                segments.len(),
                candidates.total(),
                links.len()
            ));

            self.state = TrackerState::AssemblingGraph;
            for link in &links {
                graph.add_edge(link.source, link.target, link.cost)?;
            }
        } else {
            self.state = TrackerState::AssemblingGraph;
        }

        Ok(graph)
    }
}

impl fmt::Debug for SparseLapTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseLapTracker")
            .field("objects", &self.objects.len())
            .field("state", &self.state)
            .field("num_threads", &self.num_threads)
            .field("canceled", &self.cancel.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{KEY_ALLOW_GAP_CLOSING, KEY_LINKING_MAX_DISTANCE};
    use crate::{ObjectId, TrackableObject, VoidLogger};

    fn objects(points: &[(u64, i32, f64, f64)]) -> ObjectCollection {
        ObjectCollection::from_objects(
            points
                .iter()
                .map(|&(id, frame, x, y)| TrackableObject::new(id, frame, &[x, y]).unwrap()),
        )
        .unwrap()
    }

    fn tracker(points: &[(u64, i32, f64, f64)], settings: Settings) -> SparseLapTracker {
        let mut t = SparseLapTracker::new(objects(points), settings).with_logger(Arc::new(VoidLogger));
        t.set_num_threads(2);
        t
    }

    #[test]
    fn test_simple_track() {
        let mut t = tracker(
            &[(1, 0, 0.0, 0.0), (2, 1, 1.0, 0.0), (3, 2, 2.0, 0.0)],
            Settings::default_lap(),
        );
        assert!(t.check_input());
        assert_eq!(t.state(), &TrackerState::Idle);
        assert!(t.process());
        assert_eq!(t.state(), &TrackerState::Done);

        let graph = t.result().unwrap();
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_weight(ObjectId(1), ObjectId(2)), Some(1.0));
        assert_eq!(graph.edge_weight(ObjectId(2), ObjectId(3)), Some(1.0));
    }

    #[test]
    fn test_gap_is_closed() {
        // Frame 2 only holds a far away object, so 2 -> 3 cannot be linked
        // frame to frame and has to be closed across the gap.
        let mut t = tracker(
            &[
                (1, 0, 0.0, 0.0),
                (2, 1, 1.0, 0.0),
                (9, 2, 100.0, 100.0),
                (3, 3, 3.0, 0.0),
                (4, 4, 4.0, 0.0),
            ],
            Settings::default_lap(),
        );
        assert!(t.process());
        let graph = t.result().unwrap();
        assert_eq!(graph.edge_weight(ObjectId(2), ObjectId(3)), Some(4.0));
        assert!(graph.contains_edge(ObjectId(1), ObjectId(2)));
        assert!(graph.contains_edge(ObjectId(3), ObjectId(4)));
        assert_eq!(graph.in_degree(ObjectId(9)) + graph.out_degree(ObjectId(9)), 0);
    }

    #[test]
    fn test_invalid_settings() {
        let mut settings = Settings::default_lap();
        settings.insert(KEY_LINKING_MAX_DISTANCE, -3.0);
        let mut t = tracker(&[(1, 0, 0.0, 0.0)], settings);
        assert!(!t.check_input());
        assert!(matches!(t.state(), TrackerState::Failed(_)));
        assert!(t.error_message().unwrap().contains("LINKING_MAX_DISTANCE"));

        assert!(!t.process());
        assert!(t.result().is_none());
    }

    #[test]
    fn test_cancel_before_run() {
        let mut t = tracker(&[(1, 0, 0.0, 0.0), (2, 1, 1.0, 0.0)], Settings::default_lap());
        t.cancel("not needed");
        assert!(t.is_canceled());
        assert!(!t.process());
        assert_eq!(t.state(), &TrackerState::Canceled("not needed".to_string()));
        assert_eq!(t.cancel_reason().as_deref(), Some("not needed"));
        assert!(t.result().is_none());

        t.cancel_token().reset();
        assert!(t.process());
        assert_eq!(t.result().unwrap().edge_count(), 1);
    }

    #[test]
    fn test_no_segment_stage_when_disabled() {
        let mut settings = Settings::default_lap();
        settings.insert(KEY_ALLOW_GAP_CLOSING, false);
        let mut t = tracker(&[(1, 0, 0.0, 0.0), (2, 2, 1.0, 0.0), (3, 2, 50.0, 0.0)], settings);
        assert!(t.process());
        assert_eq!(t.result().unwrap().edge_count(), 1);
    }

    #[derive(Default)]
    struct RecordingLogger {
        messages: std::sync::Mutex<Vec<String>>,
    }

    impl ProgressLogger for RecordingLogger {
        fn set_status(&self, _status: &str) {}

        fn set_progress(&self, _progress: f64) {}

        fn log(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_stage_summaries_are_logged() {
        let logger = Arc::new(RecordingLogger::default());
        let mut t = SparseLapTracker::new(
            objects(&[(1, 0, 0.0, 0.0), (2, 1, 1.0, 0.0), (9, 2, 100.0, 100.0), (3, 3, 3.0, 0.0)]),
            Settings::default_lap(),
        )
        .with_logger(logger.clone());
        assert!(t.process());

        let messages = logger.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "Frame to frame linking: 1 links.");
        assert!(messages[1].starts_with("Segment linking: 3 segments"));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TrackerState::Canceled("user".to_string()).to_string(), "canceled: user");
        assert!(TrackerState::Done.is_terminal());
        assert!(!TrackerState::SegmentSolving.is_terminal());
    }
}

//! Integration tests for the sparse LAP tracker.
//!
//! These tests run complete tracking workflows through the public API.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sparselap_rs::object::RADIUS;
use sparselap_rs::settings::*;
use sparselap_rs::tracking::link_all_frames;
use sparselap_rs::{
    CancelToken, Edge, LapSettings, LinkageGraph, ObjectCollection, ObjectId, ProgressLogger, Settings,
    SparseLapTracker, TrackableObject, TrackerState, VoidLogger,
};

// =============================================================================
// Helpers
// =============================================================================

fn collection(points: &[(u64, i32, f64, f64)]) -> ObjectCollection {
    ObjectCollection::from_objects(
        points
            .iter()
            .map(|&(id, frame, x, y)| TrackableObject::new(id, frame, &[x, y]).unwrap()),
    )
    .unwrap()
}

fn run(objects: ObjectCollection, settings: Settings, num_threads: usize) -> LinkageGraph {
    let mut tracker = SparseLapTracker::new(objects, settings).with_logger(Arc::new(VoidLogger));
    tracker.set_num_threads(num_threads);
    assert!(tracker.check_input(), "{:?}", tracker.error_message());
    assert!(tracker.process(), "{:?}", tracker.error_message());
    tracker.result().unwrap().clone()
}

fn edge_pairs(graph: &LinkageGraph) -> Vec<(u64, u64)> {
    graph.edges().map(|e| (e.source.0, e.target.0)).collect()
}

/// Particles drifting from well separated starting points, with random
/// missed detections. Particle 0 is never missed so no frame is empty.
fn random_walk(seed: u64, particles: usize, frames: i32, dropout: f64) -> ObjectCollection {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut positions: Vec<(f64, f64)> = (0..particles).map(|i| (i as f64 * 40.0, 0.0)).collect();
    let mut objects = ObjectCollection::new();
    let mut next_id = 0u64;
    for frame in 0..frames {
        for (i, (x, y)) in positions.iter_mut().enumerate() {
            *x += rng.random_range(-1.0..1.0);
            *y += rng.random_range(-1.0..1.0);
            if i > 0 && rng.random::<f64>() < dropout {
                continue;
            }
            objects
                .add(TrackableObject::new(next_id, frame, &[*x, *y]).unwrap())
                .unwrap();
            next_id += 1;
        }
    }
    objects
}

fn all_events_enabled() -> Settings {
    let mut settings = Settings::default_lap();
    settings.insert(KEY_ALLOW_TRACK_SPLITTING, true);
    settings.insert(KEY_ALLOW_TRACK_MERGING, true);
    settings
}

// =============================================================================
// Scenario A: Straight Lines
// =============================================================================

#[test]
fn test_integration_straight_lines() {
    let mut points = Vec::new();
    let mut id = 0;
    for frame in 0..5 {
        for line in 0..3 {
            points.push((id, frame, frame as f64 * 2.0, line as f64 * 50.0));
            id += 1;
        }
    }
    let graph = run(collection(&points), Settings::default_lap(), 4);

    assert_eq!(graph.vertex_count(), 15);
    assert_eq!(graph.edge_count(), 12);
    for edge in graph.edges() {
        // Same line, next frame, cost = displacement squared.
        assert_eq!(edge.target.0, edge.source.0 + 3);
        assert_eq!(edge.weight, 4.0);
    }
    for line in 0..3u64 {
        for frame in 0..4u64 {
            let source = ObjectId(frame * 3 + line);
            assert_eq!(graph.successors(source), vec![ObjectId(source.0 + 3)]);
        }
    }
}

// =============================================================================
// Scenario B: Splitting
// =============================================================================

#[test]
fn test_integration_splitting_branches() {
    // Segment 1-2-3 ends two units away from the heads of 4-5 and 6-7,
    // beyond the frame-to-frame linking range.
    let objects = collection(&[
        (1, 0, 0.0, 0.0),
        (2, 1, 1.0, 0.0),
        (3, 2, 2.0, 0.0),
        (4, 3, 2.0, 2.0),
        (5, 4, 3.0, 2.0),
        (6, 3, 2.0, -2.0),
        (7, 4, 3.0, -2.0),
    ]);
    let mut settings = Settings::default_lap();
    settings.insert(KEY_LINKING_MAX_DISTANCE, 1.5);
    settings.insert(KEY_ALLOW_TRACK_SPLITTING, true);

    let graph = run(objects, settings, 2);
    assert_eq!(graph.out_degree(ObjectId(3)), 2);
    assert_eq!(graph.successors(ObjectId(3)), vec![ObjectId(4), ObjectId(6)]);
    assert_eq!(graph.edge_weight(ObjectId(3), ObjectId(4)), Some(4.0));
    assert_eq!(graph.edge_weight(ObjectId(3), ObjectId(6)), Some(4.0));
    assert_eq!(edge_pairs(&graph), vec![(1, 2), (2, 3), (3, 4), (3, 6), (4, 5), (6, 7)]);
}

#[test]
fn test_integration_splitting_disabled_keeps_single_link() {
    let objects = collection(&[
        (1, 0, 0.0, 0.0),
        (2, 1, 1.0, 0.0),
        (3, 2, 2.0, 0.0),
        (4, 3, 2.0, 2.0),
        (6, 3, 2.0, -2.0),
    ]);
    let mut settings = Settings::default_lap();
    settings.insert(KEY_LINKING_MAX_DISTANCE, 1.5);

    let graph = run(objects, settings, 2);
    // Gap closing alone picks one of the two heads.
    assert_eq!(graph.out_degree(ObjectId(3)), 1);
}

#[test]
fn test_integration_splitting_without_gap_closing() {
    let objects = collection(&[
        (1, 0, 0.0, 0.0),
        (2, 1, 1.0, 0.0),
        (3, 2, 2.0, 0.0),
        (4, 3, 2.0, 2.0),
        (5, 4, 3.0, 2.0),
        (6, 3, 2.0, -2.0),
        (7, 4, 3.0, -2.0),
    ]);
    let mut settings = Settings::default_lap();
    settings.insert(KEY_LINKING_MAX_DISTANCE, 1.5);
    settings.insert(KEY_ALLOW_GAP_CLOSING, false);
    settings.insert(KEY_ALLOW_TRACK_SPLITTING, true);

    let graph = run(objects, settings, 2);
    assert_eq!(graph.out_degree(ObjectId(3)), 2);
    assert_eq!(graph.edge_weight(ObjectId(3), ObjectId(4)), Some(4.0));
    assert_eq!(graph.edge_weight(ObjectId(3), ObjectId(6)), Some(4.0));
    assert_eq!(edge_pairs(&graph), vec![(1, 2), (2, 3), (3, 4), (3, 6), (4, 5), (6, 7)]);
}

// =============================================================================
// Merging
// =============================================================================

/// Track 1-2 ends two units away from 5, an interior point of 3-4-5-6.
fn merging_objects() -> ObjectCollection {
    collection(&[
        (1, 0, 1.0, 2.0),
        (2, 1, 2.0, 2.0),
        (3, 0, 0.0, 0.0),
        (4, 1, 1.0, 0.0),
        (5, 2, 2.0, 0.0),
        (6, 3, 3.0, 0.0),
    ])
}

#[test]
fn test_integration_merging_converges() {
    let mut settings = Settings::default_lap();
    settings.insert(KEY_LINKING_MAX_DISTANCE, 1.5);
    settings.insert(KEY_ALLOW_TRACK_MERGING, true);

    let graph = run(merging_objects(), settings, 2);
    assert_eq!(graph.in_degree(ObjectId(5)), 2);
    assert_eq!(graph.predecessors(ObjectId(5)), vec![ObjectId(2), ObjectId(4)]);
    assert_eq!(graph.edge_weight(ObjectId(2), ObjectId(5)), Some(4.0));
    assert_eq!(graph.edge_weight(ObjectId(4), ObjectId(5)), Some(1.0));
    assert_eq!(edge_pairs(&graph), vec![(1, 2), (2, 5), (3, 4), (4, 5), (5, 6)]);
}

#[test]
fn test_integration_merging_disabled() {
    let mut settings = Settings::default_lap();
    settings.insert(KEY_LINKING_MAX_DISTANCE, 1.5);

    let graph = run(merging_objects(), settings, 2);
    assert_eq!(graph.in_degree(ObjectId(5)), 1);
    assert_eq!(graph.out_degree(ObjectId(2)), 0);
}

#[test]
fn test_integration_last_representable_frame() {
    let objects = collection(&[
        (1, i32::MAX - 1, 0.0, 0.0),
        (2, i32::MAX, 1.0, 0.0),
        (3, i32::MAX, 0.0, 5.0),
    ]);
    let graph = run(objects, all_events_enabled(), 2);
    assert_eq!(graph.edge_weight(ObjectId(1), ObjectId(2)), Some(1.0));
    assert!(graph.edges().all(|e| e.source != e.target));
}

// =============================================================================
// Scenario C: Empty Input
// =============================================================================

#[test]
fn test_integration_empty_input() {
    let mut tracker = SparseLapTracker::new(ObjectCollection::new(), all_events_enabled());
    assert!(tracker.check_input());
    assert!(tracker.process());
    assert_eq!(tracker.state(), &TrackerState::Done);
    assert!(tracker.result().unwrap().is_empty());
    assert_eq!(tracker.error_message(), None);
}

#[test]
fn test_integration_single_frame() {
    let graph = run(collection(&[(1, 0, 0.0, 0.0), (2, 0, 1.0, 0.0)]), all_events_enabled(), 1);
    assert_eq!(graph.vertex_count(), 2);
    assert_eq!(graph.edge_count(), 0);
}

// =============================================================================
// Scenario D: Segment Stage Disabled
// =============================================================================

#[test]
fn test_integration_no_segment_events_equals_frame_to_frame() {
    let objects = random_walk(7, 6, 12, 0.2);
    let mut settings = Settings::default_lap();
    settings.insert(KEY_ALLOW_GAP_CLOSING, false);

    let lap = LapSettings::from_settings(&settings).unwrap();
    let expected: Vec<(u64, u64)> =
        link_all_frames(&objects, &lap.linking, &CancelToken::new(), &VoidLogger)
            .unwrap()
            .iter()
            .map(|l| (l.source.0, l.target.0))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

    let graph = run(objects, settings, 3);
    assert_eq!(edge_pairs(&graph), expected);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_integration_determinism_across_thread_counts() {
    let first = run(random_walk(42, 8, 15, 0.15), all_events_enabled(), 1);
    let second = run(random_walk(42, 8, 15, 0.15), all_events_enabled(), 4);
    let third = run(random_walk(42, 8, 15, 0.15), all_events_enabled(), 4);

    let first: Vec<Edge> = first.edges().collect();
    let second: Vec<Edge> = second.edges().collect();
    let third: Vec<Edge> = third.edges().collect();
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn test_integration_gap_closing_bound() {
    let mut settings = Settings::default_lap();
    settings.insert(KEY_GAP_CLOSING_MAX_FRAME_GAP, 2);
    let objects = random_walk(1234, 8, 20, 0.3);
    let graph = run(objects, settings, 4);

    for edge in graph.edges() {
        let gap = graph.frame(edge.target).unwrap() - graph.frame(edge.source).unwrap();
        assert!((1..=2).contains(&gap), "edge {} -> {} spans {} frames", edge.source, edge.target, gap);
    }
}

#[test]
fn test_integration_matching_without_split_or_merge() {
    let graph = run(random_walk(99, 8, 15, 0.2), Settings::default_lap(), 2);
    for (id, _) in graph.vertices() {
        assert!(graph.out_degree(id) <= 1);
        assert!(graph.in_degree(id) <= 1);
    }
}

#[test]
fn test_integration_overlap_linking() {
    let mut objects = ObjectCollection::new();
    for frame in 0..4 {
        for (i, y) in [0.0, 40.0].iter().enumerate() {
            let id = (frame * 2 + i as i32) as u64;
            let object = TrackableObject::new(id, frame, &[frame as f64, *y])
                .unwrap()
                .with_feature(RADIUS, 5.0);
            objects.add(object).unwrap();
        }
    }
    let mut settings = Settings::default_lap();
    settings.insert(KEY_COST_METHOD, "OVERLAP");
    settings.insert(KEY_MIN_IOU, 0.5);
    settings.insert(KEY_IOU_CALCULATION, "FAST");

    let graph = run(objects, settings, 2);
    assert_eq!(graph.edge_count(), 6);
    for edge in graph.edges() {
        assert_eq!(edge.target.0, edge.source.0 + 2);
        assert!(edge.weight > 0.0 && edge.weight < 0.5);
    }
}

// =============================================================================
// Cancellation & Failure
// =============================================================================

/// Cancels the run as soon as any progress is reported.
struct CancelOnProgress(CancelToken);

impl ProgressLogger for CancelOnProgress {
    fn set_status(&self, _status: &str) {}

    fn set_progress(&self, _progress: f64) {
        self.0.cancel("enough");
    }
}

#[test]
fn test_integration_cancel_during_run() {
    let objects = random_walk(5, 4, 10, 0.0);
    let tracker = SparseLapTracker::new(objects, Settings::default_lap());
    let token = tracker.cancel_token();
    let mut tracker = tracker.with_logger(Arc::new(CancelOnProgress(token)));
    tracker.set_num_threads(1);

    assert!(!tracker.process());
    assert_eq!(tracker.state(), &TrackerState::Canceled("enough".to_string()));
    assert_eq!(tracker.cancel_reason().as_deref(), Some("enough"));
    assert!(tracker.error_message().unwrap().contains("enough"));
    assert!(tracker.result().is_none());
}

#[test]
fn test_integration_cancel_from_other_thread() {
    let objects = random_walk(6, 4, 10, 0.0);
    let mut tracker = SparseLapTracker::new(objects, Settings::default_lap()).with_logger(Arc::new(VoidLogger));
    let token = tracker.cancel_token();
    std::thread::spawn(move || token.cancel("shutdown")).join().unwrap();

    assert!(tracker.is_canceled());
    assert!(!tracker.process());
    assert!(matches!(tracker.state(), TrackerState::Canceled(reason) if reason == "shutdown"));
}

#[test]
fn test_integration_failed_run_keeps_previous_result() {
    let objects = collection(&[(1, 0, 0.0, 0.0), (2, 1, 1.0, 0.0)]);
    let mut tracker = SparseLapTracker::new(objects, Settings::default_lap()).with_logger(Arc::new(VoidLogger));
    assert!(tracker.process());
    let committed = tracker.result().unwrap().clone();

    tracker.cancel("stop");
    assert!(!tracker.process());
    assert_eq!(tracker.result(), Some(&committed));
    assert!(tracker.state().is_terminal());
}

#[test]
fn test_integration_invalid_settings_reported() {
    let mut settings = Settings::default_lap();
    settings.insert(KEY_COST_METHOD, "NEAREST");
    settings.insert("UNKNOWN_KEY", true);
    let mut tracker = SparseLapTracker::new(collection(&[(1, 0, 0.0, 0.0)]), settings);

    assert!(!tracker.check_input());
    let message = tracker.error_message().unwrap().to_string();
    assert!(message.contains("NEAREST"), "{}", message);
    assert!(message.contains("UNKNOWN_KEY"), "{}", message);
    assert!(!tracker.process());
    assert!(matches!(tracker.state(), TrackerState::Failed(_)));
}

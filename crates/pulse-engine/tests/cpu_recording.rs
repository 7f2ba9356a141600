//! CPU recording through the full engine: threads, depth, the window.

use std::collections::HashMap;

use proptest::prelude::*;

use pulse_core::{FrameId, QueryError, TrackKind};
use pulse_engine::{Profiler, ProfilerConfig};

fn cpu_profiler(history_size: usize, max_events_per_frame: u32) -> Profiler {
    Profiler::new(ProfilerConfig {
        history_size,
        max_events_per_frame,
        ..ProfilerConfig::default()
    })
    .expect("valid config")
}

#[test]
fn nested_events_keep_begin_time_depth() {
    let p = cpu_profiler(4, 64);
    let mut rec = p.register_thread("worker");
    rec.begin("update");
    rec.begin("physics");
    rec.begin("broadphase");
    rec.end();
    rec.end();
    rec.begin("animation");
    rec.end();
    rec.end();
    let track = rec.track();
    p.tick();

    let mut seen = Vec::new();
    p.read_frame(track, FrameId(0), |ev| {
        seen.push((ev.name().to_owned(), ev.depth()));
    })
    .expect("frame 0 readable");
    assert_eq!(
        seen,
        vec![
            ("update".to_owned(), 0),
            ("physics".to_owned(), 1),
            ("broadphase".to_owned(), 2),
            ("animation".to_owned(), 1),
        ]
    );
}

#[test]
fn each_thread_lands_on_its_own_track() {
    let p = cpu_profiler(4, 64);
    std::thread::scope(|s| {
        let p = &p;
        for name in ["render", "audio", "io"] {
            s.spawn(move || {
                let mut rec = p.register_thread(name);
                rec.begin("work");
                rec.end();
            });
        }
    });
    p.tick();

    let mut by_track: HashMap<String, usize> = HashMap::new();
    for info in p.tracks() {
        if info.kind != TrackKind::CpuThread || info.producer == 0 {
            continue;
        }
        let mut count = 0;
        p.read_frame(info.id, FrameId(0), |_| count += 1)
            .expect("readable");
        by_track.insert(info.name.clone(), count);
    }
    assert_eq!(by_track.len(), 3);
    assert!(by_track.values().all(|&c| c == 1));
}

#[test]
fn overflow_drops_for_rest_of_frame_and_counts() {
    let p = cpu_profiler(4, 2);
    let mut rec = p.register_thread("busy");
    for _ in 0..5 {
        rec.begin("spin");
        rec.end();
    }
    let track = rec.track();
    p.tick();
    assert_eq!(p.metrics().dropped_cpu_events, 3);

    let mut count = 0;
    p.read_frame(track, FrameId(0), |_| count += 1).unwrap();
    assert_eq!(count, 2);

    // The next frame records normally again.
    rec.begin("spin");
    rec.end();
    p.tick();
    let mut count = 0;
    p.read_frame(track, FrameId(1), |_| count += 1).unwrap();
    assert_eq!(count, 1);
    assert_eq!(p.metrics().dropped_cpu_events, 3);
}

#[test]
fn root_frame_event_covers_each_frame() {
    let p = cpu_profiler(4, 64);
    p.tick();
    p.tick();
    let root = p
        .tracks()
        .into_iter()
        .find(|t| t.kind == TrackKind::CpuThread && t.producer == 0)
        .expect("driver track");
    for frame in [FrameId(0), FrameId(1)] {
        let mut seen = Vec::new();
        p.read_frame(root.id, frame, |ev| {
            seen.push((ev.name().to_owned(), ev.begin_ticks(), ev.end_ticks()));
        })
        .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "CPU Frame");
        assert!(seen[0].2 >= seen[0].1);
    }
}

#[test]
fn history_wrap_evicts_without_stale_leakage() {
    let p = cpu_profiler(4, 16);
    let mut rec = p.register_thread("worker");
    let track = rec.track();
    let names: Vec<String> = (0..6).map(|i| format!("frame {i}")).collect();
    for name in &names {
        rec.begin(name);
        rec.end();
        p.tick();
    }
    // Current frame is 6; the window holds frames 3..6.
    let window = p.frame_window();
    assert_eq!(window.oldest, FrameId(3));
    assert_eq!(window.newest, FrameId(6));
    assert_eq!(
        p.read_frame(track, FrameId(2), |_| {}),
        Err(QueryError::Evicted { frame: FrameId(2) })
    );
    assert_eq!(
        p.read_frame(track, FrameId(6), |_| {}),
        Err(QueryError::NotResolved { frame: FrameId(6) })
    );
    for f in 3..6u64 {
        let mut seen = Vec::new();
        p.read_frame(track, FrameId(f), |ev| seen.push(ev.name().to_owned()))
            .unwrap();
        assert_eq!(seen, vec![format!("frame {f}")], "frame {f} content");
    }
}

#[test]
fn tick_metrics_report_frame_time_statistics() {
    let p = cpu_profiler(4, 16);
    std::thread::sleep(std::time::Duration::from_millis(1));
    p.tick();
    std::thread::sleep(std::time::Duration::from_millis(1));
    p.tick();
    let m = p.metrics();
    assert_eq!(m.frame, FrameId(1));
    assert!(m.frame_ms > 0.0);
    assert!(m.frame_ms_min > 0.0);
    assert!(m.frame_ms_min <= m.frame_ms_avg);
    assert!(m.frame_ms_avg <= m.frame_ms_max);
}

#[test]
fn registry_is_idempotent_and_renames() {
    let p = cpu_profiler(4, 16);
    let a = p.register_track("first", TrackKind::GpuQueue, 9);
    let b = p.register_track("renamed", TrackKind::GpuQueue, 9);
    assert_eq!(a, b);
    let info = p.tracks().into_iter().find(|t| t.id == a).unwrap();
    assert_eq!(info.name, "renamed");
}

proptest! {
    /// Depth recorded at begin always equals the stack depth a reference
    /// simulation computes from the same begin/end sequence.
    #[test]
    fn depth_matches_reference_simulation(moves in proptest::collection::vec(any::<bool>(), 0..200)) {
        let p = cpu_profiler(4, 1024);
        let mut rec = p.register_thread("fuzz");
        let track = rec.track();

        let mut depth = 0usize;
        let mut expected = Vec::new();
        for begin in moves {
            // Fix up invalid moves so the sequence stays balanced and
            // within the depth bound.
            if begin && depth < 31 {
                expected.push(depth as u8);
                rec.begin("node");
                depth += 1;
            } else if depth > 0 {
                rec.end();
                depth -= 1;
            }
        }
        while depth > 0 {
            rec.end();
            depth -= 1;
        }
        p.tick();

        let mut recorded = Vec::new();
        p.read_frame(track, FrameId(0), |ev| recorded.push(ev.depth())).unwrap();
        prop_assert_eq!(recorded, expected);
    }
}

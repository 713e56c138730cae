//! Integration tests for artifact persistence through the public API.

use std::path::PathBuf;

use chrono::Utc;
use meetscribe::persist::{MeetingRecord, PersistenceLayer};

fn layer() -> (tempfile::TempDir, PersistenceLayer) {
    let dir = tempfile::tempdir().unwrap();
    let layer = PersistenceLayer::new(
        dir.path().join("meetings"),
        dir.path().join("meetscribe.db"),
    )
    .unwrap();
    (dir, layer)
}

fn record(id: &str, title: &str) -> MeetingRecord {
    MeetingRecord {
        id: id.to_string(),
        title: title.to_string(),
        participants: vec!["Alice".to_string()],
        transcript: "We discussed the quarterly roadmap.".to_string(),
        summary: None,
        key_points: None,
        action_items: None,
        audio_file: PathBuf::from("/tmp/audio.wav"),
        duration_seconds: 300,
        started_at: Utc::now(),
        created_at: Utc::now(),
    }
}

#[test]
fn recorded_audio_duration_matches_recording_length() {
    let (_dir, layer) = layer();

    // Simulate a 3-second recording at 16 kHz that was interrupted
    // mid-chunk: 3 s plus a 100-sample tail.
    let sample_rate = 16000u32;
    let samples = vec![0.05f32; sample_rate as usize * 3 + 100];
    let path = layer
        .write_audio_file("meeting-x", &samples, sample_rate, 1)
        .unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    let duration = reader.len() as f64 / reader.spec().sample_rate as f64;

    // Within one chunk-period (1024 frames at 16 kHz ≈ 64 ms) of 3 s.
    assert!((duration - 3.0).abs() < 1024.0 / sample_rate as f64);
}

#[test]
fn record_writes_are_visible_and_complete() {
    let (_dir, layer) = layer();

    let mut rec = record("meeting-1", "Planning");
    rec.summary = Some("Roadmap agreed".to_string());
    rec.action_items = Some(vec!["Circulate the roadmap document".to_string()]);

    let path = layer.write_meeting_record(&rec).unwrap();
    assert!(path.exists());

    // No leftover temp files next to the record.
    let siblings: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| !name.ends_with(".json"))
        .collect();
    assert!(siblings.is_empty(), "unexpected files: {siblings:?}");

    let loaded = layer.read_meeting_record("meeting-1").unwrap().unwrap();
    assert_eq!(loaded.title, "Planning");
    assert_eq!(loaded.summary.as_deref(), Some("Roadmap agreed"));
    assert_eq!(
        loaded.action_items.as_deref(),
        Some(&["Circulate the roadmap document".to_string()][..])
    );
}

#[test]
fn listing_returns_newest_records_first() {
    let (_dir, layer) = layer();

    for (i, id) in ["meeting-a", "meeting-b", "meeting-c"].iter().enumerate() {
        let mut rec = record(id, &format!("Meeting {i}"));
        rec.created_at = Utc::now() + chrono::Duration::seconds(i as i64);
        layer.write_meeting_record(&rec).unwrap();
    }

    let entries = layer.list_meeting_records(10).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].id, "meeting-c");
    assert_eq!(entries[2].id, "meeting-a");
}

#[test]
fn meeting_ids_are_time_derived_and_collision_free() {
    let (_dir, layer) = layer();

    let first = layer.allocate_meeting_id();
    assert!(first.starts_with("meeting-"));

    layer.write_audio_file(&first, &[0.0], 16000, 1).unwrap();
    let second = layer.allocate_meeting_id();
    assert_ne!(first, second);
}

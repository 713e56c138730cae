//! Artifact persistence: WAV audio, meeting-record JSON, SQLite index.
//!
//! Record writes are atomic (temp-file-then-rename) so a crash can never
//! leave a half-written record visible to readers. The SQLite table is an
//! index over the JSON documents, used for listing and lookup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::info;

/// The persisted artifact of one finished meeting. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: String,
    pub title: String,
    pub participants: Vec<String>,
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_items: Option<Vec<String>>,
    pub audio_file: PathBuf,
    pub duration_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One row of the record index, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingIndexEntry {
    pub id: String,
    pub title: String,
    pub record_path: PathBuf,
    pub audio_path: PathBuf,
    pub duration_seconds: i64,
    pub created_at: String,
}

pub struct PersistenceLayer {
    meetings_dir: PathBuf,
    db_path: PathBuf,
}

impl PersistenceLayer {
    pub fn new(meetings_dir: PathBuf, db_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&meetings_dir)
            .context("Failed to create meetings directory")?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let layer = Self {
            meetings_dir,
            db_path,
        };
        // Run migrations up front so the first meeting doesn't pay for them.
        layer.open()?;
        Ok(layer)
    }

    pub fn meetings_dir(&self) -> &Path {
        &self.meetings_dir
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database connection")?;
        migrate(&conn)?;
        Ok(conn)
    }

    /// Allocate a fresh time-derived meeting id, resolving same-second
    /// collisions with a counter suffix.
    pub fn allocate_meeting_id(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let base = format!("meeting-{}", timestamp);

        if !self.meetings_dir.join(format!("{base}.wav")).exists() {
            return base;
        }
        for i in 1..100 {
            let candidate = format!("{base}-{i}");
            if !self.meetings_dir.join(format!("{candidate}.wav")).exists() {
                return candidate;
            }
        }
        base
    }

    /// Write the finalized waveform as a WAV file. Valid (correct header and
    /// duration) even for an empty or mid-chunk-interrupted capture.
    pub fn write_audio_file(
        &self,
        id: &str,
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
    ) -> Result<PathBuf> {
        let path = self.meetings_dir.join(format!("{id}.wav"));

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file {:?}", path))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize().context("Failed to finalize WAV file")?;

        info!("Meeting audio saved: {:?} ({} samples)", path, samples.len());
        Ok(path)
    }

    /// Atomically persist the record document and index it.
    pub fn write_meeting_record(&self, record: &MeetingRecord) -> Result<PathBuf> {
        let path = self.meetings_dir.join(format!("{}.json", record.id));

        let body = serde_json::to_vec_pretty(record)
            .context("Failed to serialize meeting record")?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.meetings_dir)
            .context("Failed to create temp record file")?;
        temp.write_all(&body)
            .context("Failed to write meeting record")?;
        temp.persist(&path)
            .context("Failed to move meeting record into place")?;

        let conn = self.open()?;
        conn.execute(
            "INSERT OR REPLACE INTO meeting_records \
             (id, title, record_path, audio_path, duration_seconds, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.title,
                path.to_string_lossy(),
                record.audio_file.to_string_lossy(),
                record.duration_seconds as i64,
                record.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to index meeting record")?;

        info!("Meeting record saved: {:?}", path);
        Ok(path)
    }

    pub fn read_meeting_record(&self, id: &str) -> Result<Option<MeetingRecord>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare("SELECT record_path FROM meeting_records WHERE id = ?1")
            .context("Failed to prepare record query")?;

        let record_path: Option<String> = stmt
            .query_row(params![id], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("Failed to query meeting record")?;

        let Some(record_path) = record_path else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(&record_path)
            .with_context(|| format!("Failed to read meeting record {record_path}"))?;
        let record: MeetingRecord =
            serde_json::from_str(&content).context("Failed to parse meeting record")?;
        Ok(Some(record))
    }

    pub fn list_meeting_records(&self, limit: usize) -> Result<Vec<MeetingIndexEntry>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, record_path, audio_path, duration_seconds, created_at \
                 FROM meeting_records ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .context("Failed to prepare records list query")?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(MeetingIndexEntry {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    record_path: PathBuf::from(row.get::<_, String>(2)?),
                    audio_path: PathBuf::from(row.get::<_, String>(3)?),
                    duration_seconds: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .context("Failed to list meeting records")?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meeting_records (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            record_path TEXT NOT NULL,
            audio_path TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create meeting_records table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meeting_records_created_at \
         ON meeting_records(created_at DESC)",
        [],
    )
    .context("Failed to create index on created_at")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> (tempfile::TempDir, PersistenceLayer) {
        let dir = tempfile::tempdir().unwrap();
        let layer = PersistenceLayer::new(
            dir.path().join("meetings"),
            dir.path().join("meetscribe.db"),
        )
        .unwrap();
        (dir, layer)
    }

    fn record(id: &str) -> MeetingRecord {
        MeetingRecord {
            id: id.to_string(),
            title: "Standup".to_string(),
            participants: vec!["Alice".to_string(), "Bob".to_string()],
            transcript: "Alice gave an update.".to_string(),
            summary: None,
            key_points: None,
            action_items: None,
            audio_file: PathBuf::from("/tmp/audio.wav"),
            duration_seconds: 60,
            started_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_wav_duration_matches_sample_count() {
        let (_dir, layer) = layer();
        // 1.5 seconds of audio at 16 kHz.
        let samples = vec![0.1f32; 24000];
        let path = layer.write_audio_file("m1", &samples, 16000, 1).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 24000);
        let duration = reader.len() as f64 / reader.spec().sample_rate as f64;
        assert!((duration - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_capture_still_writes_valid_container() {
        let (_dir, layer) = layer();
        let path = layer.write_audio_file("empty", &[], 16000, 1).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn test_record_roundtrip() {
        let (_dir, layer) = layer();
        let mut rec = record("m1");
        rec.summary = Some("Short summary".to_string());
        rec.key_points = Some(vec!["Point one is long enough".to_string()]);

        layer.write_meeting_record(&rec).unwrap();
        let loaded = layer.read_meeting_record("m1").unwrap().unwrap();

        assert_eq!(loaded.title, "Standup");
        assert_eq!(loaded.participants, vec!["Alice", "Bob"]);
        assert_eq!(loaded.summary.as_deref(), Some("Short summary"));
        assert_eq!(loaded.transcript, "Alice gave an update.");
    }

    #[test]
    fn test_optional_fields_absent_from_json() {
        let (_dir, layer) = layer();
        let path = layer.write_meeting_record(&record("m1")).unwrap();

        let body = std::fs::read_to_string(path).unwrap();
        assert!(!body.contains("\"summary\""));
        assert!(!body.contains("\"key_points\""));
        assert!(!body.contains("\"action_items\""));
    }

    #[test]
    fn test_read_missing_record() {
        let (_dir, layer) = layer();
        assert!(layer.read_meeting_record("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let (_dir, layer) = layer();
        for (i, id) in ["m1", "m2", "m3"].iter().enumerate() {
            let mut rec = record(id);
            rec.created_at = Utc::now() + chrono::Duration::seconds(i as i64);
            layer.write_meeting_record(&rec).unwrap();
        }

        let entries = layer.list_meeting_records(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "m3");
    }

    #[test]
    fn test_allocate_meeting_id_avoids_collisions() {
        let (_dir, layer) = layer();
        let first = layer.allocate_meeting_id();
        layer.write_audio_file(&first, &[0.0], 16000, 1).unwrap();
        let second = layer.allocate_meeting_id();
        assert_ne!(first, second);
    }
}

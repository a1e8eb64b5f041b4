//! Append-only job journal
//!
//! One record per line: `{crc32:08x} {record json}\n`. The checksum covers
//! the JSON bytes. Every append is fsynced. A record either stores a job's
//! latest state or removes a finished job. On replay the last record for a
//! job id wins; a record failing its checksum aborts the replay.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{QueueError, QueueResult};
use super::job::Job;

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JournalRecord {
    Upsert(Job),
    Remove(Uuid),
}

/// Borrowed form written by appends; serializes like [`JournalRecord`]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum RecordRef<'a> {
    Upsert(&'a Job),
    Remove(Uuid),
}

/// CRC32 (IEEE) over `data`
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

fn encode_record(record: &RecordRef<'_>) -> QueueResult<String> {
    let json = serde_json::to_string(record)
        .map_err(|e| QueueError::Internal(format!("failed to encode journal record: {}", e)))?;
    Ok(format!("{:08x} {}\n", compute_checksum(json.as_bytes()), json))
}

fn decode_record(line_no: usize, line: &str) -> QueueResult<JournalRecord> {
    let corrupted = |reason: &str| QueueError::Corrupted {
        line: line_no,
        reason: reason.to_string(),
    };

    let (crc_hex, json) = line
        .split_once(' ')
        .ok_or_else(|| corrupted("missing checksum separator"))?;
    let crc = u32::from_str_radix(crc_hex, 16).map_err(|_| corrupted("bad checksum field"))?;
    if !verify_checksum(json.as_bytes(), crc) {
        return Err(corrupted("checksum mismatch"));
    }
    serde_json::from_str(json).map_err(|e| corrupted(&e.to_string()))
}

/// Journal file handle
pub struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    /// Open (creating if needed) for appending
    pub fn open(path: &Path) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, job: &Job) -> QueueResult<()> {
        self.write(&RecordRef::Upsert(job))
    }

    /// Record that job `id` is gone
    pub fn append_removal(&mut self, id: Uuid) -> QueueResult<()> {
        self.write(&RecordRef::Remove(id))
    }

    fn write(&mut self, record: &RecordRef<'_>) -> QueueResult<()> {
        let line = encode_record(record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Replace the journal contents with exactly `jobs`
    pub fn rewrite<'a>(&mut self, jobs: impl Iterator<Item = &'a Job>) -> QueueResult<()> {
        let mut contents = String::new();
        for job in jobs {
            contents.push_str(&encode_record(&RecordRef::Upsert(job))?);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }

    /// Read every record in order. A missing file replays as empty.
    pub fn replay(path: &Path) -> QueueResult<Vec<JournalRecord>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(decode_record(index + 1, &line)?);
        }
        Ok(records)
    }
}

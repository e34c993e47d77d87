use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::entry::Entry;
use crate::error::{KvError, KvResult};

/// One staged mutation inside a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    Put(Entry),
    Delete(Vec<u8>),
}

/// A committed transaction as persisted in the log.
///
/// On-disk framing:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LogRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub commit_ts: u64,
    pub ops: Vec<LogOp>,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct LogWriter {
    writer: BufWriter<File>,
    offset: u64,
}

/// Append-only, crash-recoverable commit log.
///
/// Records are appended before a commit becomes visible. Recovery reads the
/// file front to back: records failing the CRC are skipped, and a torn tail
/// (short header or payload) ends recovery and is cut from the file.
pub struct CommitLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    sync_mode: SyncMode,
}

impl CommitLog {
    /// Open (or create) the log file at `path`.
    pub fn open(path: &Path, sync_mode: SyncMode) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                writer: BufWriter::new(file),
                offset,
            }),
            sync_mode,
        })
    }

    /// Append one record. Returns its byte offset.
    pub fn append(&self, record: &LogRecord) -> KvResult<u64> {
        let payload = encode(record)?;
        let mut w = self.writer.lock().expect("commit log mutex poisoned");
        let at = w.offset;
        write_frame(&mut w.writer, &payload)?;
        self.flush(&mut w.writer)?;
        w.offset += (HEADER_SIZE + payload.len()) as u64;

        debug!(offset = at, len = payload.len(), ops = record.ops.len(), "commit log append");
        Ok(at)
    }

    /// Read every valid record in file order and cut off a torn tail, so
    /// later appends land directly after the last intact frame.
    pub fn recover(&self) -> KvResult<Vec<LogRecord>> {
        let mut w = self.writer.lock().expect("commit log mutex poisoned");
        w.writer.flush()?;
        let (records, valid_end) = read_frames(&self.path)?;

        let len = w.writer.get_ref().metadata()?.len();
        if valid_end < len {
            w.writer.get_ref().set_len(valid_end)?;
            w.writer.get_ref().sync_all()?;
            warn!(from = len, to = valid_end, "truncated torn commit log tail");
        }
        w.offset = valid_end;

        debug!(recovered = records.len(), "commit log recovery complete");
        Ok(records)
    }

    /// Read the records of the log at `path` without opening it for writing.
    /// A missing file reads as empty.
    pub fn read_records(path: &Path) -> KvResult<Vec<LogRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let (records, _) = read_frames(path)?;
        Ok(records)
    }

    /// Atomically replace the log contents with `records`.
    ///
    /// Writes a sibling temp file, renames it over the log, then reopens the
    /// writer at the new end.
    pub fn rewrite(&self, records: &[LogRecord]) -> KvResult<()> {
        let mut w = self.writer.lock().expect("commit log mutex poisoned");
        let tmp_path = self.path.with_extension("log.tmp");

        let mut offset = 0u64;
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            for record in records {
                let payload = encode(record)?;
                write_frame(&mut tmp, &payload)?;
                offset += (HEADER_SIZE + payload.len()) as u64;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        w.writer = BufWriter::new(file);
        w.offset = offset;

        debug!(records = records.len(), bytes = offset, "commit log rewritten");
        Ok(())
    }

    /// Current end-of-log offset.
    pub fn offset(&self) -> u64 {
        self.writer.lock().expect("commit log mutex poisoned").offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, writer: &mut BufWriter<File>) -> io::Result<()> {
        writer.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLog")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}

/// Decode frames front to back. Returns the records and the offset just past
/// the last complete frame.
fn read_frames(path: &Path) -> KvResult<(Vec<LogRecord>, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut offset: u64 = 0;

    loop {
        let mut header = [0u8; HEADER_SIZE];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if length == 0 {
            warn!(offset, "zero-length commit log frame; stopping recovery");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, length, "truncated commit log frame; stopping recovery");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping commit log record"
            );
        } else {
            match bincode::deserialize::<LogRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => warn!(offset, error = %e, "undecodable commit log record; skipping"),
            }
        }

        offset += (HEADER_SIZE + payload.len()) as u64;
    }

    Ok((records, offset))
}

fn encode(record: &LogRecord) -> KvResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| KvError::Serialization(e.to_string()))
}

fn write_frame<W: Write>(out: &mut W, payload: &[u8]) -> io::Result<()> {
    out.write_all(&(payload.len() as u32).to_le_bytes())?;
    out.write_all(&crc32fast::hash(payload).to_le_bytes())?;
    out.write_all(payload)
}

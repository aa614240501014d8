//! Checkpoint files for model and optimizer snapshots.
//!
//! Any `Serialize` payload can be checkpointed; in practice it is one of the snapshot
//! types (`ParameterSnapshot`, `GlmSnapshot`, `BiasedMfSnapshot`, ...), which hold the
//! weights and optimizer state as plain key -> value maps plus the iteration counter.
//!
//! # Binary Format
//!
//! | Offset | Size | Field | Description |
//! |--------|------|-------|-------------|
//! | 0 | 4 | magic | "STRM" |
//! | 4 | 4 | version | u32 (current: 1) |
//! | 8 | 4 | flags | bit 0: compressed |
//! | 12 | 4 | checksum | CRC32 of data |
//! | 16 | 8 | examples_seen | u64 little-endian |
//! | 24 | 8 | timestamp | i64 Unix timestamp |
//! | 32 | .. | data | bincode payload (optionally gzip-compressed) |
//!
//! Files are named `checkpoint_NNNNNNNNNNNN.bin` after the number of examples seen.
//! Saves write to a temporary file and rename it into place, so a crash mid-save never
//! leaves a truncated checkpoint behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crc32fast::Hasher as Crc32Hasher;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::learning::{LearningError, Result};

/// 4-byte magic header ("STRM").
pub const CHECKPOINT_MAGIC: &[u8; 4] = b"STRM";

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Flag bit indicating compression is enabled.
pub const FLAG_COMPRESSED: u32 = 1;

/// Default retention count for checkpoints.
pub const DEFAULT_RETENTION_COUNT: usize = 5;

const FILE_PREFIX: &str = "checkpoint_";
const FILE_SUFFIX: &str = ".bin";

/// Checkpoint header with version, flags, and CRC32 checksum.
///
/// # Binary Format (32 bytes)
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0 | 4 | magic ("STRM") |
/// | 4 | 4 | version (u32) |
/// | 8 | 4 | flags (u32) |
/// | 12 | 4 | checksum (u32) |
/// | 16 | 8 | examples_seen (u64) |
/// | 24 | 8 | timestamp (i64) |
#[derive(Clone, Debug, PartialEq)]
pub struct CheckpointHeader {
    /// Magic bytes for format identification ("STRM").
    pub magic: [u8; 4],
    /// Format version number.
    pub version: u32,
    /// Flags (bit 0: compressed).
    pub flags: u32,
    /// CRC32 checksum of the data section.
    pub checksum: u32,
    /// Number of examples seen at checkpoint time.
    pub examples_seen: u64,
    /// Unix timestamp when checkpoint was created.
    pub timestamp: i64,
}

impl CheckpointHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 32;

    /// Create a new checkpoint header stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `examples_seen` - Number of examples the model has been trained on
    /// * `compressed` - Whether data will be compressed
    pub fn new(examples_seen: u64, compressed: bool) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let flags = if compressed { FLAG_COMPRESSED } else { 0 };

        Self {
            magic: *CHECKPOINT_MAGIC,
            version: CHECKPOINT_VERSION,
            flags,
            checksum: 0, // Set during save after data serialization
            examples_seen,
            timestamp,
        }
    }

    /// Set the CRC32 checksum.
    pub fn set_checksum(&mut self, checksum: u32) {
        self.checksum = checksum;
    }

    /// Check if compression flag is set.
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.examples_seen.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes.
    ///
    /// # Errors
    ///
    /// Returns error if magic bytes don't match or version is incompatible.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(LearningError::InvalidCheckpoint(format!(
                "Header too small: expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if &magic != CHECKPOINT_MAGIC {
            return Err(LearningError::InvalidCheckpoint(format!(
                "Invalid magic header: expected {:?}, got {:?}",
                CHECKPOINT_MAGIC, magic
            )));
        }

        let version = u32::from_le_bytes(le_array(&bytes[4..8]));
        if version != CHECKPOINT_VERSION {
            return Err(LearningError::InvalidCheckpoint(format!(
                "Version mismatch: expected {}, got {}",
                CHECKPOINT_VERSION, version
            )));
        }

        Ok(Self {
            magic,
            version,
            flags: u32::from_le_bytes(le_array(&bytes[8..12])),
            checksum: u32::from_le_bytes(le_array(&bytes[12..16])),
            examples_seen: u64::from_le_bytes(le_array(&bytes[16..24])),
            timestamp: i64::from_le_bytes(le_array(&bytes[24..32])),
        })
    }
}

/// Copy a slice whose length was checked by the caller into a fixed-size array.
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Summary of one checkpoint file, read from its header.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckpointInfo {
    pub path: PathBuf,
    pub examples_seen: u64,
    /// Local creation time, `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
    pub size_bytes: u64,
}

/// Checkpoint manager with CRC32 integrity, optional gzip compression and retention.
///
/// # Example
///
/// ```no_run
/// use streamlearn::learning::CheckpointManager;
/// use streamlearn::optim::ParameterSnapshot;
///
/// # fn run(snapshot: ParameterSnapshot<String, f64>) -> streamlearn::learning::Result<()> {
/// let manager = CheckpointManager::new("checkpoints", 5, true)?;
/// manager.save(10_000, &snapshot)?;
///
/// if let Some((restored, header)) = manager.load_latest::<ParameterSnapshot<String, f64>>()? {
///     assert_eq!(header.examples_seen, 10_000);
///     assert_eq!(restored, snapshot);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CheckpointManager {
    /// Directory for checkpoint files.
    checkpoint_dir: PathBuf,
    /// Number of checkpoints to retain.
    retention_count: usize,
    /// Whether to compress checkpoint data.
    compression_enabled: bool,
}

impl CheckpointManager {
    /// Create a new checkpoint manager.
    ///
    /// Creates the checkpoint directory if it doesn't exist.
    ///
    /// # Arguments
    ///
    /// * `checkpoint_dir` - Path to checkpoint directory
    /// * `retention_count` - Number of checkpoints to keep (default: 5)
    /// * `compression_enabled` - Whether to compress checkpoints
    pub fn new<P: AsRef<Path>>(
        checkpoint_dir: P,
        retention_count: usize,
        compression_enabled: bool,
    ) -> Result<Self> {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();

        if retention_count == 0 {
            return Err(LearningError::Config(
                "retention_count should be at least 1".to_string(),
            ));
        }

        if !checkpoint_dir.exists() {
            fs::create_dir_all(&checkpoint_dir)?;
        }

        Ok(Self {
            checkpoint_dir,
            retention_count,
            compression_enabled,
        })
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Get the current retention count.
    pub fn retention_count(&self) -> usize {
        self.retention_count
    }

    /// Set the retention count. Zero is raised to one.
    pub fn set_retention(&mut self, count: usize) {
        self.retention_count = count.max(1);
    }

    /// Check if compression is enabled.
    pub fn compression_enabled(&self) -> bool {
        self.compression_enabled
    }

    /// Enable or disable compression.
    pub fn set_compression(&mut self, enabled: bool) {
        self.compression_enabled = enabled;
    }

    /// Checkpoint filename for a given number of examples.
    ///
    /// Format: checkpoint_NNNNNNNNNNNN.bin
    pub fn checkpoint_filename(examples_seen: u64) -> String {
        format!("{}{:012}{}", FILE_PREFIX, examples_seen, FILE_SUFFIX)
    }

    /// Get full path for a checkpoint file.
    pub fn checkpoint_path(&self, examples_seen: u64) -> PathBuf {
        self.checkpoint_dir
            .join(Self::checkpoint_filename(examples_seen))
    }

    /// Save `payload` with CRC32 integrity and optional compression.
    ///
    /// Uses atomic write (write-to-temp-then-rename) to prevent corruption, then
    /// applies the retention policy.
    ///
    /// # Returns
    ///
    /// Tuple of (path, file_size_bytes, save_duration_secs).
    pub fn save<T: Serialize>(
        &self,
        examples_seen: u64,
        payload: &T,
    ) -> Result<(PathBuf, u64, f64)> {
        let start_time = Instant::now();
        let checkpoint_path = self.checkpoint_path(examples_seen);
        let temp_path = checkpoint_path.with_extension("tmp");

        let data = bincode::serde::encode_to_vec(payload, bincode::config::standard())?;

        let final_data = if self.compression_enabled {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder.write_all(&data)?;
            encoder.finish()?
        } else {
            data
        };

        let mut hasher = Crc32Hasher::new();
        hasher.update(&final_data);

        let mut header = CheckpointHeader::new(examples_seen, self.compression_enabled);
        header.set_checksum(hasher.finalize());

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.to_bytes())?;
        writer.write_all(&final_data)?;
        writer.flush()?;
        drop(writer);

        fs::rename(&temp_path, &checkpoint_path)?;

        let file_size = fs::metadata(&checkpoint_path)?.len();
        self.apply_retention()?;
        let duration = start_time.elapsed().as_secs_f64();

        log::info!(
            "Checkpoint saved: {} ({} bytes, {:.2}s, compression: {})",
            checkpoint_path.display(),
            file_size,
            duration,
            self.compression_enabled
        );

        Ok((checkpoint_path, file_size, duration))
    }

    /// Load a checkpoint with CRC32 verification.
    ///
    /// # Errors
    ///
    /// `LearningError::InvalidCheckpoint` on a bad header, a checksum mismatch or a
    /// payload that does not decode as `T`.
    pub fn load<T: DeserializeOwned>(
        &self,
        checkpoint_path: &Path,
    ) -> Result<(T, CheckpointHeader)> {
        let (header, data) = Self::read_verified(checkpoint_path)?;

        let data = if header.is_compressed() {
            let mut decoder = GzDecoder::new(Cursor::new(data));
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            decompressed
        } else {
            data
        };

        let (payload, _) =
            bincode::serde::decode_from_slice::<T, _>(&data, bincode::config::standard())
                .map_err(|e| {
                    LearningError::InvalidCheckpoint(format!(
                        "{}: payload does not decode: {}",
                        checkpoint_path.display(),
                        e
                    ))
                })?;

        log::info!(
            "Checkpoint loaded: {} ({} examples seen)",
            checkpoint_path.display(),
            header.examples_seen
        );

        Ok((payload, header))
    }

    /// Load the latest checkpoint in the directory, if any.
    pub fn load_latest<T: DeserializeOwned>(&self) -> Result<Option<(T, CheckpointHeader)>> {
        match self.find_latest()? {
            Some(path) => Ok(Some(self.load(&path)?)),
            None => Ok(None),
        }
    }

    /// Verify checkpoint integrity without decoding the payload.
    ///
    /// # Returns
    ///
    /// True if the checksum matches. A bad header is an error.
    pub fn verify(&self, checkpoint_path: &Path) -> Result<bool> {
        let (header, data) = Self::read_raw(checkpoint_path)?;
        Ok(crc32fast::hash(&data) == header.checksum)
    }

    /// List all checkpoints with a readable header, newest first.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        let mut checkpoints = Vec::new();

        for (_, path) in self.checkpoint_files()? {
            let Ok(file) = File::open(&path) else {
                continue;
            };
            let mut reader = BufReader::new(file);
            let mut header_bytes = [0u8; CheckpointHeader::SIZE];
            if reader.read_exact(&mut header_bytes).is_ok()
                && let Ok(header) = CheckpointHeader::from_bytes(&header_bytes)
            {
                let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                let created_at = chrono::DateTime::from_timestamp(header.timestamp, 0)
                    .map(|dt| {
                        dt.with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string()
                    })
                    .unwrap_or_else(|| "unknown".to_string());

                checkpoints.push(CheckpointInfo {
                    path,
                    examples_seen: header.examples_seen,
                    created_at,
                    size_bytes,
                });
            }
        }

        checkpoints.sort_by(|a, b| b.examples_seen.cmp(&a.examples_seen));
        Ok(checkpoints)
    }

    /// Find the checkpoint with the most examples seen.
    pub fn find_latest(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .checkpoint_files()?
            .into_iter()
            .max_by_key(|(examples_seen, _)| *examples_seen)
            .map(|(_, path)| path))
    }

    /// Apply retention policy, deleting old checkpoints.
    fn apply_retention(&self) -> Result<Vec<PathBuf>> {
        let mut checkpoints = self.checkpoint_files()?;
        checkpoints.sort_by(|a, b| b.0.cmp(&a.0));

        let mut deleted = Vec::new();
        for (_, path) in checkpoints.into_iter().skip(self.retention_count) {
            if fs::remove_file(&path).is_ok() {
                log::info!("Deleted old checkpoint: {}", path.display());
                deleted.push(path);
            }
        }

        Ok(deleted)
    }

    /// Every `checkpoint_*.bin` file in the directory with its example count.
    fn checkpoint_files(&self) -> Result<Vec<(u64, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.checkpoint_dir)? {
            let path = entry?.path();
            if let Some(filename) = path.file_name().and_then(|n| n.to_str())
                && let Some(examples_seen) = Self::parse_checkpoint_filename(filename)
            {
                files.push((examples_seen, path));
            }
        }
        Ok(files)
    }

    /// Parse the example count from a checkpoint filename.
    fn parse_checkpoint_filename(filename: &str) -> Option<u64> {
        filename
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_SUFFIX)?
            .parse()
            .ok()
    }

    /// Header and data section, without checking the checksum.
    fn read_raw(checkpoint_path: &Path) -> Result<(CheckpointHeader, Vec<u8>)> {
        let file = File::open(checkpoint_path)?;
        let mut reader = BufReader::new(file);

        let mut header_bytes = [0u8; CheckpointHeader::SIZE];
        reader.read_exact(&mut header_bytes)?;
        let header = CheckpointHeader::from_bytes(&header_bytes)?;

        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok((header, data))
    }

    /// Header and data section, failing on a checksum mismatch.
    fn read_verified(checkpoint_path: &Path) -> Result<(CheckpointHeader, Vec<u8>)> {
        let (header, data) = Self::read_raw(checkpoint_path)?;

        let computed_checksum = crc32fast::hash(&data);
        if computed_checksum != header.checksum {
            log::warn!("Corrupted checkpoint: {}", checkpoint_path.display());
            return Err(LearningError::InvalidCheckpoint(format!(
                "Checksum mismatch: expected {:#010x}, computed {:#010x}. Data may be corrupted.",
                header.checksum, computed_checksum
            )));
        }

        Ok((header, data))
    }
}

use crate::storage_traits::{JournalEntry, WriteSetJournal};
use crate::transaction::WriteSet;
use bincode;
use cbdc_core::error::StoreError;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Bytes of the little-endian length prefix in front of every entry
const LEN_PREFIX: u64 = 8;

/// A file-based journal of committed write-sets.
///
/// Each entry is written as a little-endian u64 length followed by the
/// bincode-encoded [`JournalEntry`]. Opening a journal cuts off any torn or
/// corrupt tail, so new entries always follow the last readable one.
pub struct FileWriteAheadLog {
    state: Arc<Mutex<JournalState>>,
}

struct JournalState {
    /// Path to the journal file
    path: PathBuf,

    /// File handle for writing
    writer: Option<BufWriter<File>>,

    /// Sequence number handed to the next entry
    next_sequence: u64,

    /// Length of the journal in bytes, up to the end of the last entry
    len: u64,

    /// Sequence and start offset of the most recent entry
    last_entry: Option<(u64, u64)>,
}

impl FileWriteAheadLog {
    /// Create a new file-based journal
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(JournalState {
                path: PathBuf::new(),
                writer: None,
                next_sequence: 0,
                len: 0,
                last_entry: None,
            })),
        }
    }

    /// Create a journal and open it at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let journal = Self::new();
        journal.init(path)?;
        Ok(journal)
    }

    fn lock(&self) -> Result<MutexGuard<'_, JournalState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Journal(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for FileWriteAheadLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Count the readable entries at the head of the journal at `path` and the
/// byte offset where the last of them ends.
fn scan_valid_prefix(path: &Path) -> Result<(u64, u64), StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((0, 0)),
        Err(e) => return Err(StoreError::from(e)),
    };

    let mut entries = JournalEntryIterator::new(file)?;
    let mut count = 0;
    for entry in entries.by_ref() {
        match entry {
            Ok(_) => count += 1,
            Err(e) => {
                log::warn!("Journal {:?} has an unreadable tail: {}", path, e);
                break;
            }
        }
    }
    Ok((count, entries.offset))
}

impl WriteSetJournal for FileWriteAheadLog {
    fn init(&self, path: &Path) -> Result<(), StoreError> {
        let mut state = self.lock()?;

        let (existing, valid_len) = scan_valid_prefix(path)?;

        // Create or open the journal file
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
            .map_err(|e| StoreError::Journal(format!("Failed to open journal file: {}", e)))?;

        // Drop whatever follows the last readable entry
        let file_len = file.metadata()?.len();
        if file_len > valid_len {
            log::warn!(
                "Truncating journal {:?} from {} to {} bytes",
                path,
                file_len,
                valid_len
            );
            file.set_len(valid_len)?;
        }

        state.path = path.to_path_buf();
        state.writer = Some(BufWriter::new(file));
        state.next_sequence = existing;
        state.len = valid_len;
        state.last_entry = None;

        log::debug!("Opened write-set journal at {:?} ({} entries)", path, existing);
        Ok(())
    }

    fn record(&self, tx_id: &str, write_set: &WriteSet) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let state = &mut *state;

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| StoreError::Journal("Journal has not been initialized".to_string()))?;

        let entry = JournalEntry {
            sequence: state.next_sequence,
            tx_id: tx_id.to_string(),
            write_set: write_set.clone(),
        };

        // Serialize the entry
        let serialized = bincode::serialize(&entry)?;

        // Write the entry length and data
        let entry_len = serialized.len() as u64;
        writer.write_all(&entry_len.to_le_bytes())?;
        writer.write_all(&serialized)?;
        writer.flush()?;

        state.last_entry = Some((entry.sequence, state.len));
        state.len += LEN_PREFIX + entry_len;
        state.next_sequence += 1;
        Ok(entry.sequence)
    }

    fn discard_last(&self, sequence: u64) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let state = &mut *state;

        let offset = match state.last_entry {
            Some((last, offset)) if last == sequence => offset,
            _ => {
                return Err(StoreError::Journal(format!(
                    "Entry {} is not the most recent journal entry",
                    sequence
                )))
            }
        };

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| StoreError::Journal("Journal has not been initialized".to_string()))?;
        writer.flush()?;
        writer.get_ref().set_len(offset)?;

        state.len = offset;
        state.next_sequence = sequence;
        state.last_entry = None;
        log::info!("Discarded journal entry {}", sequence);
        Ok(())
    }

    fn iterate_entries(&self) -> Box<dyn Iterator<Item = Result<JournalEntry, StoreError>> + '_> {
        // Get the path
        let path = match self.lock() {
            Ok(state) => state.path.clone(),
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        match File::open(&path) {
            Ok(file) => match JournalEntryIterator::new(file) {
                Ok(entries) => Box::new(entries),
                Err(e) => Box::new(std::iter::once(Err(e))),
            },
            // Nothing has been journaled yet
            Err(_) => Box::new(std::iter::empty::<Result<JournalEntry, StoreError>>()),
        }
    }
}

/// Iterator over journal entries
struct JournalEntryIterator {
    reader: BufReader<File>,
    /// Bytes not yet read from the file
    remaining: u64,
    /// End of the last entry read successfully
    offset: u64,
    failed: bool,
}

impl JournalEntryIterator {
    fn new(file: File) -> Result<Self, StoreError> {
        let remaining = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            remaining,
            offset: 0,
            failed: false,
        })
    }

    fn fail(&mut self, err: StoreError) -> Option<Result<JournalEntry, StoreError>> {
        self.failed = true;
        Some(Err(err))
    }
}

impl Iterator for JournalEntryIterator {
    type Item = Result<JournalEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }

        if self.remaining < LEN_PREFIX {
            return self.fail(StoreError::Journal(format!(
                "Truncated length prefix at offset {}",
                self.offset
            )));
        }

        // Read the entry length
        let mut len_buf = [0u8; LEN_PREFIX as usize];
        if let Err(e) = self.reader.read_exact(&mut len_buf) {
            return self.fail(StoreError::from(e));
        }
        self.remaining -= LEN_PREFIX;

        // The prefix is untrusted until it fits in what is left of the file
        let entry_len = u64::from_le_bytes(len_buf);
        if entry_len > self.remaining {
            return self.fail(StoreError::Journal(format!(
                "Truncated journal entry at offset {}: needs {} bytes, {} left",
                self.offset, entry_len, self.remaining
            )));
        }

        // Read the entry data
        let mut entry_data = vec![0u8; entry_len as usize];
        if let Err(e) = self.reader.read_exact(&mut entry_data) {
            return self.fail(StoreError::Journal(format!(
                "Truncated journal entry: {}",
                e
            )));
        }
        self.remaining -= entry_len;

        match bincode::deserialize::<JournalEntry>(&entry_data) {
            Ok(entry) => {
                self.offset += LEN_PREFIX + entry_len;
                Some(Ok(entry))
            }
            Err(e) => self.fail(StoreError::from(e)),
        }
    }
}

//! Binary index reader.
//!
//! Opens an index, validates its version, and answers per-function
//! queries by seeking straight to the record of interest. Trace
//! headers are read once on first use and cached for the lifetime of
//! the reader instance.
//!
//! A reader exclusively owns its file handle. Callers that need
//! parallel queries open independent readers.

use crate::index::cost::format_cost;
use crate::index::{EDGE_WORDS, RECORD_HEADER_WORDS, WORD};
use crate::utils::config::{CostFormat, INDEX_VERSION};
use crate::utils::error::ReaderError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Metadata of one function record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub filename: String,
    pub function_name: String,
    pub line: u32,
    /// Self cost rendered in the requested format
    pub summed_self_cost: String,
    /// Self cost as stored, for sorting and further math
    pub summed_self_cost_raw: u32,
    pub summed_inclusive_cost: String,
    pub invocation_count: u32,
    pub called_from_count: u32,
    pub sub_call_count: u32,
}

/// One caller or sub-call edge of a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    /// Index of the peer function
    pub function: u32,
    /// Call-site line
    pub line: u32,
    pub call_count: u32,
    pub summed_call_cost: String,
}

/// Cached trace headers, populated on first header query
#[derive(Debug)]
struct HeaderCache {
    /// Number of summary lines seen, one per aggregated run
    runs: u64,
    /// Summed time component of all summary lines
    summary: u64,
    values: HashMap<String, String>,
}

/// Random-access reader over a binary index
pub struct IndexReader {
    file: BufReader<File>,
    headers_pos: u32,
    offsets: Vec<u32>,
    format: CostFormat,
    headers: Option<HeaderCache>,
}

impl IndexReader {
    /// Open an index file and load its offset table
    ///
    /// **Public** - the entry point for all queries
    ///
    /// # Errors
    /// * `ReaderError::Open` - file cannot be opened
    /// * `ReaderError::VersionMismatch` - index was written by another
    ///   format version; carries both numbers
    /// * `ReaderError::Read` - truncated or unreadable index
    pub fn open(path: &Path, format: CostFormat) -> Result<Self, ReaderError> {
        let file = File::open(path).map_err(|source| ReaderError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut file = BufReader::new(file);

        let version = read_word(&mut file)?;
        if version != INDEX_VERSION {
            return Err(ReaderError::VersionMismatch {
                found: version,
                expected: INDEX_VERSION,
            });
        }
        let headers_pos = read_word(&mut file)?;
        let count = read_word(&mut file)?;

        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            offsets.push(read_word(&mut file)?);
        }
        debug!("opened index: {} functions", count);

        Ok(Self {
            file,
            headers_pos,
            offsets,
            format,
            headers: None,
        })
    }

    /// Number of functions in the index
    pub fn function_count(&self) -> u32 {
        self.offsets.len() as u32
    }

    /// Read one function's metadata
    ///
    /// `format` overrides the reader's default cost format for this
    /// call when given.
    ///
    /// # Errors
    /// * `ReaderError::FunctionOutOfRange` - no such function index
    pub fn function_info(
        &mut self,
        index: u32,
        format: Option<CostFormat>,
    ) -> Result<FunctionInfo, ReaderError> {
        let offset = self.function_offset(index)?;
        self.file.seek(SeekFrom::Start(offset))?;

        let line = read_word(&mut self.file)?;
        let self_cost = read_word(&mut self.file)?;
        let inclusive_cost = read_word(&mut self.file)?;
        let invocation_count = read_word(&mut self.file)?;
        let called_from_count = read_word(&mut self.file)?;
        let sub_call_count = read_word(&mut self.file)?;

        // The strings sit after both edge lists
        let edges = u64::from(called_from_count) + u64::from(sub_call_count);
        self.file
            .seek(SeekFrom::Current((edges * EDGE_WORDS * WORD) as i64))?;
        let filename = self.read_string()?;
        let function_name = self.read_string()?;

        let format = format.unwrap_or(self.format);
        Ok(FunctionInfo {
            filename,
            function_name,
            line,
            summed_self_cost: self.render_cost(self_cost, format)?,
            summed_self_cost_raw: self_cost,
            summed_inclusive_cost: self.render_cost(inclusive_cost, format)?,
            invocation_count,
            called_from_count,
            sub_call_count,
        })
    }

    /// Read one inbound (caller) edge of a function
    ///
    /// # Errors
    /// * `ReaderError::FunctionOutOfRange` - no such function index
    /// * `ReaderError::EdgeOutOfRange` - `edge` is not below the
    ///   function's calledFrom count
    pub fn called_from_info(
        &mut self,
        index: u32,
        edge: u32,
        format: Option<CostFormat>,
    ) -> Result<CallInfo, ReaderError> {
        let offset = self.function_offset(index)?;
        let (called_from_count, _) = self.edge_counts(offset)?;
        if edge >= called_from_count {
            return Err(ReaderError::EdgeOutOfRange {
                index: edge,
                count: called_from_count,
            });
        }

        let position = offset + WORD * (RECORD_HEADER_WORDS + EDGE_WORDS * u64::from(edge));
        self.read_edge(position, format)
    }

    /// Read one outbound (sub-call) edge of a function
    ///
    /// # Errors
    /// * `ReaderError::FunctionOutOfRange` - no such function index
    /// * `ReaderError::EdgeOutOfRange` - `edge` is not below the
    ///   function's subCall count
    pub fn sub_call_info(
        &mut self,
        index: u32,
        edge: u32,
        format: Option<CostFormat>,
    ) -> Result<CallInfo, ReaderError> {
        let offset = self.function_offset(index)?;
        let (called_from_count, sub_call_count) = self.edge_counts(offset)?;
        if edge >= sub_call_count {
            return Err(ReaderError::EdgeOutOfRange {
                index: edge,
                count: sub_call_count,
            });
        }

        // Sub-call edges sit behind the whole calledFrom list
        let position = offset
            + WORD
                * (RECORD_HEADER_WORDS
                    + EDGE_WORDS * (u64::from(called_from_count) + u64::from(edge)));
        self.read_edge(position, format)
    }

    /// Look up a trace header by name
    ///
    /// The first call reads and caches the whole headers block.
    /// `summary` aggregates across runs: `runs` counts summary lines,
    /// `summary` sums their time components. Other headers overwrite.
    /// Unset headers resolve to the empty string.
    pub fn get_header(&mut self, name: &str) -> Result<String, ReaderError> {
        let cache = self.ensure_headers()?;
        let value = match name {
            "runs" => cache.runs.to_string(),
            "summary" => cache.summary.to_string(),
            _ => cache.values.get(name).cloned().unwrap_or_default(),
        };
        Ok(value)
    }

    fn function_offset(&self, index: u32) -> Result<u64, ReaderError> {
        match self.offsets.get(index as usize) {
            Some(&offset) => Ok(u64::from(offset)),
            None => Err(ReaderError::FunctionOutOfRange {
                index,
                count: self.function_count(),
            }),
        }
    }

    /// Read the two edge counts from a record's fixed header
    fn edge_counts(&mut self, offset: u64) -> Result<(u32, u32), ReaderError> {
        self.file.seek(SeekFrom::Start(offset + 4 * WORD))?;
        let called_from_count = read_word(&mut self.file)?;
        let sub_call_count = read_word(&mut self.file)?;
        Ok((called_from_count, sub_call_count))
    }

    fn read_edge(
        &mut self,
        position: u64,
        format: Option<CostFormat>,
    ) -> Result<CallInfo, ReaderError> {
        self.file.seek(SeekFrom::Start(position))?;
        let function = read_word(&mut self.file)?;
        let line = read_word(&mut self.file)?;
        let call_count = read_word(&mut self.file)?;
        let cost = read_word(&mut self.file)?;

        let format = format.unwrap_or(self.format);
        Ok(CallInfo {
            function,
            line,
            call_count,
            summed_call_cost: self.render_cost(cost, format)?,
        })
    }

    fn render_cost(&mut self, cost: u32, format: CostFormat) -> Result<String, ReaderError> {
        // Only percentages need the summary time; avoid touching the
        // headers block otherwise
        let summary = match format {
            CostFormat::Percent => self.summary_time()?,
            _ => 0,
        };
        Ok(format_cost(cost, format, summary))
    }

    fn summary_time(&mut self) -> Result<u64, ReaderError> {
        Ok(self.ensure_headers()?.summary)
    }

    fn ensure_headers(&mut self) -> Result<&HeaderCache, ReaderError> {
        if self.headers.is_none() {
            let cache = self.load_headers()?;
            self.headers = Some(cache);
        }
        // Just populated above when absent
        Ok(self.headers.as_ref().unwrap())
    }

    fn load_headers(&mut self) -> Result<HeaderCache, ReaderError> {
        let mut cache = HeaderCache {
            runs: 0,
            summary: 0,
            values: HashMap::from([
                ("cmd".to_string(), String::new()),
                ("creator".to_string(), String::new()),
            ]),
        };

        self.file.seek(SeekFrom::Start(u64::from(self.headers_pos)))?;
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.file.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            let Some((key, value)) = crate::parser::callgrind::split_header(line.trim_end())
            else {
                continue;
            };
            if key == "summary" {
                cache.runs += 1;
                cache.summary += crate::parser::callgrind::summary_time(value);
            } else {
                cache.values.insert(key.to_string(), value.to_string());
            }
        }
        debug!(
            "cached {} headers over {} runs",
            cache.values.len(),
            cache.runs
        );
        Ok(cache)
    }

    fn read_string(&mut self) -> Result<String, ReaderError> {
        let mut bytes = Vec::new();
        self.file.read_until(b'\n', &mut bytes)?;
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
        }
        Ok(String::from_utf8(bytes)?)
    }
}

fn read_word<R: Read>(reader: &mut R) -> Result<u32, ReaderError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

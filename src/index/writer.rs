//! Binary index writer.
//!
//! Serializes a [`TraceModel`] into the on-disk layout described in
//! the module docs of [`crate::index`]. The header slots that depend
//! on record positions (headersPos, the function-offset table) are
//! written as placeholders first and patched once every record is out.
//!
//! Writes are all-or-nothing: the index is written to a sibling
//! temporary file and renamed over the target on success, so a failed
//! run never leaves an index the reader would accept.

use crate::preprocessor::model::{EdgeStats, FunctionRecord, TraceModel};
use crate::utils::config::INDEX_VERSION;
use crate::utils::error::IndexError;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Write the aggregated model as a binary index at `path`
///
/// **Public** - the serialization half of preprocessing
///
/// # Errors
/// * `IndexError::Create` - destination cannot be created
/// * `IndexError::Write` - underlying I/O failure
/// * `IndexError::CostOverflow` - a counter no longer fits 32 bits
pub fn write_index(model: &TraceModel, path: &Path) -> Result<(), IndexError> {
    let tmp_path = temp_path(path);
    debug!("writing index to temporary file {}", tmp_path.display());

    if let Err(e) = write_to(model, &tmp_path) {
        // Best effort; the original error is the one that matters
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)?;

    info!(
        "wrote index with {} functions to {}",
        model.functions.len(),
        path.display()
    );
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_to(model: &TraceModel, path: &Path) -> Result<(), IndexError> {
    let file = File::create(path).map_err(|source| IndexError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let count = model.function_count();

    // Placeholder header: headersPos is patched at the end
    write_word(&mut writer, INDEX_VERSION)?;
    write_word(&mut writer, 0)?;
    write_word(&mut writer, count)?;

    // Reserve the offset table
    for _ in 0..count {
        write_word(&mut writer, 0)?;
    }

    // Records, in index order; remember where each one landed
    let mut offsets = Vec::with_capacity(model.functions.len());
    for record in &model.functions {
        let position = writer.stream_position()?;
        offsets.push(position_word(position, &record.name)?);
        write_record(&mut writer, record)?;
    }

    let headers_position = writer.stream_position()?;
    let headers_pos = position_word(headers_position, "headers block")?;
    for header in &model.headers {
        writer.write_all(header.as_bytes())?;
        writer.write_all(b"\n")?;
    }

    // Patch headersPos and the offset table
    writer.seek(SeekFrom::Start(4))?;
    write_word(&mut writer, headers_pos)?;
    writer.seek(SeekFrom::Start(12))?;
    for offset in &offsets {
        write_word(&mut writer, *offset)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_record<W: Write>(writer: &mut W, record: &FunctionRecord) -> Result<(), IndexError> {
    write_word(writer, record.line)?;
    write_counter(writer, record.summed_self_cost, &record.name)?;
    write_counter(writer, record.summed_inclusive_cost, &record.name)?;
    write_counter(writer, record.invocation_count, &record.name)?;
    write_word(writer, record.called_from.len() as u32)?;
    write_word(writer, record.sub_calls.len() as u32)?;

    for (key, stats) in &record.called_from {
        write_edge(writer, key.function, key.line, stats, &record.name)?;
    }
    for (key, stats) in &record.sub_calls {
        write_edge(writer, key.function, key.line, stats, &record.name)?;
    }

    writer.write_all(record.filename.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.write_all(record.name.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

fn write_edge<W: Write>(
    writer: &mut W,
    function: u32,
    line: u32,
    stats: &EdgeStats,
    owner: &str,
) -> Result<(), IndexError> {
    write_word(writer, function)?;
    write_word(writer, line)?;
    write_counter(writer, stats.call_count, owner)?;
    write_counter(writer, stats.summed_call_cost, owner)?;
    Ok(())
}

fn write_word<W: Write>(writer: &mut W, value: u32) -> Result<(), IndexError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Narrow a 64-bit in-memory counter to an on-disk word
fn write_counter<W: Write>(writer: &mut W, value: u64, owner: &str) -> Result<(), IndexError> {
    let word = u32::try_from(value).map_err(|_| IndexError::CostOverflow {
        function: owner.to_string(),
        value,
    })?;
    write_word(writer, word)
}

/// Narrow a file position to an on-disk word
fn position_word(position: u64, context: &str) -> Result<u32, IndexError> {
    u32::try_from(position).map_err(|_| IndexError::CostOverflow {
        function: context.to_string(),
        value: position,
    })
}

//! Streaming preprocessor for Callgrind traces.
//!
//! The preprocessor:
//! 1. Streams the trace line by line
//! 2. Resolves name-compression tokens
//! 3. Aggregates per-function statistics and call-site edges
//! 4. Rewrites calls through configured proxy functions
//! 5. Writes the aggregated model as a binary index
//!
//! An optional external preprocessor executable can be configured; it
//! is tried first and the in-process path runs when it is unavailable
//! or fails.

pub mod model;

pub use model::{EdgeKey, EdgeStats, FunctionRecord, TraceModel};

use crate::index::writer::write_index;
use crate::parser::callgrind::{
    is_header_line, parse_cost_line, CALL_PREFIX, FILE_PREFIX, FUNCTION_PREFIX, HEADER_SEPARATOR,
};
use crate::parser::{CompressionTables, NameKind};
use crate::utils::config::{PreprocessConfig, ENTRY_POINT};
use crate::utils::error::{ParseError, PreprocessError};
use log::{debug, info, warn};
use model::PendingCall;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::Command;

/// Callgrind trace preprocessor
///
/// **Public** - main entry point for turning a trace into an index
#[derive(Debug, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a preprocessor with the given configuration
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Preprocess `input` into a binary index at `output`
    ///
    /// **Public** - runs the external fast path when configured, the
    /// in-process parse and write otherwise
    ///
    /// # Errors
    /// * `PreprocessError::Parse` - trace cannot be opened or parsed
    /// * `PreprocessError::Index` - index cannot be written
    pub fn process(&self, input: &Path, output: &Path) -> Result<(), PreprocessError> {
        if let Some(bin) = &self.config.external_bin {
            match self.try_external(bin, input, output) {
                Ok(true) => {
                    info!("external preprocessor handled {}", input.display());
                    return Ok(());
                }
                Ok(false) => {
                    warn!(
                        "external preprocessor {} exited nonzero, falling back",
                        bin.display()
                    );
                }
                Err(e) => {
                    warn!(
                        "external preprocessor {} not runnable ({}), falling back",
                        bin.display(),
                        e
                    );
                }
            }
        }

        let model = self.parse_file(input)?;
        write_index(&model, output)?;
        Ok(())
    }

    /// Parse a trace file into the in-memory model
    pub fn parse_file(&self, input: &Path) -> Result<TraceModel, ParseError> {
        let file = File::open(input).map_err(|source| ParseError::OpenInput {
            path: input.to_path_buf(),
            source,
        })?;
        self.parse(BufReader::new(file))
    }

    /// Parse a trace from any buffered reader
    ///
    /// **Public** - used directly by tests and embedders
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<TraceModel, ParseError> {
        let mut session = ParseSession {
            config: &self.config,
            lines: reader.lines(),
            line_number: 0,
            names: CompressionTables::new(),
            model: TraceModel::new(),
            current: None,
        };
        session.run()?;
        Ok(session.model)
    }

    /// Invoke the external preprocessor binary
    ///
    /// Returns whether the child exited successfully. Spawn failures
    /// surface as I/O errors so the caller can fall back.
    fn try_external(
        &self,
        bin: &Path,
        input: &Path,
        output: &Path,
    ) -> std::io::Result<bool> {
        let mut command = Command::new(bin);
        command.arg(input).arg(output);
        for proxy in &self.config.proxy_functions {
            command.arg(proxy);
        }
        debug!("running external preprocessor: {:?}", command);
        let status = command.status()?;
        Ok(status.success())
    }
}

/// State of one streaming parse
struct ParseSession<'a, R: BufRead> {
    config: &'a PreprocessConfig,
    lines: std::io::Lines<R>,
    line_number: usize,
    names: CompressionTables,
    model: TraceModel,
    /// Function of the most recently opened fl= block
    current: Option<u32>,
}

impl<R: BufRead> ParseSession<'_, R> {
    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(line) = self.next_line()? {
            if let Some(file_spec) = line.strip_prefix(FILE_PREFIX) {
                self.handle_invocation(file_spec)?;
            } else if let Some(name_spec) = line.strip_prefix(CALL_PREFIX) {
                self.handle_call(name_spec)?;
            } else if is_header_line(&line) {
                self.model.headers.push(line.trim_end().to_string());
            }
            // Anything else is an extension we do not track
        }
        debug!(
            "parsed {} functions, {} header lines",
            self.model.functions.len(),
            self.model.headers.len()
        );
        Ok(())
    }

    /// Handle an `fl=` block: function name line, then the cost line
    fn handle_invocation(&mut self, file_spec: &str) -> Result<(), ParseError> {
        let filename = self.names.resolve(NameKind::File, file_spec);

        let fn_line = self
            .next_line()?
            .ok_or(ParseError::UnexpectedEof("fn= line after fl="))?;
        let name_spec = match fn_line.strip_prefix(FUNCTION_PREFIX) {
            Some(spec) => spec,
            None => {
                return Err(ParseError::MissingFunctionLine {
                    line: self.line_number,
                    content: fn_line,
                })
            }
        };
        let function = self.names.resolve(NameKind::Function, name_spec);

        let (lnr, cost) = if function == ENTRY_POINT {
            self.read_entry_point_cost()?
        } else {
            self.read_cost_line()?
        };

        let index = self.model.ensure_function(&function);
        self.model.record_invocation(index, &filename, lnr, cost);
        self.current = Some(index);
        Ok(())
    }

    /// Handle a `cfn=` record: filler calls= line, then the cost line
    fn handle_call(&mut self, name_spec: &str) -> Result<(), ParseError> {
        let caller = self
            .current
            .ok_or(ParseError::CallOutsideFunction(self.line_number))?;
        let callee_name = self.names.resolve(NameKind::Function, name_spec);

        // The calls= line carries no information we keep
        self.next_line()?
            .ok_or(ParseError::UnexpectedEof("calls= line after cfn="))?;
        let (lnr, cost) = self.read_cost_line()?;

        let callee = self.model.ensure_function(&callee_name);

        if self.is_proxy(caller) {
            // Defer attribution until a real caller invokes the proxy
            self.model.enqueue_proxy_call(
                caller,
                PendingCall {
                    callee,
                    line: lnr,
                    cost,
                },
            );
            return Ok(());
        }

        let (callee, cost) = if self.config.proxy_functions.contains(callee_name.as_str()) {
            // The proxy is transparent: the queued real callee and its
            // cost replace it, attributed to this call site
            let pending = self
                .model
                .dequeue_proxy_call(callee)
                .ok_or_else(|| ParseError::EmptyProxyQueue(callee_name.clone()))?;
            debug!(
                "forwarding call through proxy {} (inner call at line {})",
                callee_name, pending.line
            );
            (pending.callee, pending.cost)
        } else {
            (callee, cost)
        };

        self.model.record_call(caller, callee, lnr, cost);
        Ok(())
    }

    /// Read the cost line of the entry-point block
    ///
    /// The `{main}` block carries the trace `summary` header between
    /// the fn= line and the cost line. Blank lines are skipped, the
    /// first header-shaped line is captured, one filler line after it
    /// is discarded, then the cost line follows.
    fn read_entry_point_cost(&mut self) -> Result<(u32, u64), ParseError> {
        loop {
            let line = self
                .next_line()?
                .ok_or(ParseError::UnexpectedEof("entry-point cost line"))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.contains(HEADER_SEPARATOR) {
                self.model.headers.push(trimmed.to_string());
                self.next_line()?
                    .ok_or(ParseError::UnexpectedEof("entry-point cost line"))?;
                return self.read_cost_line();
            }
            return parse_cost_line(trimmed).ok_or(ParseError::MalformedCostLine {
                line: self.line_number,
                content: trimmed.to_string(),
            });
        }
    }

    fn read_cost_line(&mut self) -> Result<(u32, u64), ParseError> {
        let line = self
            .next_line()?
            .ok_or(ParseError::UnexpectedEof("cost line"))?;
        parse_cost_line(&line).ok_or(ParseError::MalformedCostLine {
            line: self.line_number,
            content: line,
        })
    }

    fn is_proxy(&self, index: u32) -> bool {
        let name = &self.model.functions[index as usize].name;
        self.config.proxy_functions.contains(name.as_str())
    }

    fn next_line(&mut self) -> Result<Option<String>, ParseError> {
        self.line_number += 1;
        match self.lines.next() {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(source)) => Err(ParseError::ReadLine {
                line: self.line_number,
                source,
            }),
            None => Ok(None),
        }
    }
}

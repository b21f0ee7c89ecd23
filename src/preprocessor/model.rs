//! Aggregated in-memory model of one preprocessing run.
//!
//! Function names map to dense indices in first-seen order. Each
//! function carries its invocation statistics plus two dual edge maps:
//! who called it, and whom it called, both keyed by (function, line).

use std::collections::{BTreeMap, HashMap, VecDeque};

/// Key of a call edge: the peer function and the call-site line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub function: u32,
    pub line: u32,
}

/// Accumulated statistics of one call edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeStats {
    pub call_count: u64,
    pub summed_call_cost: u64,
}

/// A call recorded inside a proxy function, awaiting its real caller
#[derive(Debug, Clone, Copy)]
pub struct PendingCall {
    pub callee: u32,
    pub line: u32,
    pub cost: u64,
}

/// Per-function aggregation
///
/// Counters are 64-bit in memory; the writer rejects values that no
/// longer fit the 32-bit on-disk fields.
#[derive(Debug, Clone, Default)]
pub struct FunctionRecord {
    pub name: String,
    pub filename: String,
    /// Source line of the first observed invocation
    pub line: u32,
    pub invocation_count: u64,
    pub summed_self_cost: u64,
    pub summed_inclusive_cost: u64,
    /// Inbound edges, keyed by (caller, call-site line)
    pub called_from: BTreeMap<EdgeKey, EdgeStats>,
    /// Outbound edges, keyed by (callee, call-site line)
    pub sub_calls: BTreeMap<EdgeKey, EdgeStats>,
}

/// The whole aggregation of one trace
#[derive(Debug, Default)]
pub struct TraceModel {
    /// Function records in index order
    pub functions: Vec<FunctionRecord>,
    /// Raw header lines in file order
    pub headers: Vec<String>,
    index_of: HashMap<String, u32>,
    proxy_queues: HashMap<u32, VecDeque<PendingCall>>,
}

impl TraceModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function_count(&self) -> u32 {
        self.functions.len() as u32
    }

    /// Look up a function's index by name
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.index_of.get(name).copied()
    }

    /// Return the index for a name, allocating the next one on first sight
    ///
    /// A function first seen as a callee starts as a stub with zeroed
    /// statistics; its first invocation fills in file and line.
    pub fn ensure_function(&mut self, name: &str) -> u32 {
        if let Some(&index) = self.index_of.get(name) {
            return index;
        }
        let index = self.functions.len() as u32;
        self.functions.push(FunctionRecord {
            name: name.to_string(),
            ..FunctionRecord::default()
        });
        self.index_of.insert(name.to_string(), index);
        index
    }

    /// Record one invocation observed in an fl=/fn= block
    pub fn record_invocation(&mut self, index: u32, filename: &str, line: u32, cost: u64) {
        let record = &mut self.functions[index as usize];
        if record.invocation_count == 0 {
            record.filename = filename.to_string();
            record.line = line;
        }
        record.invocation_count += 1;
        record.summed_self_cost += cost;
        record.summed_inclusive_cost += cost;
    }

    /// Record one call edge and charge the caller's inclusive cost
    ///
    /// The two edge maps stay dual views of the same event.
    pub fn record_call(&mut self, caller: u32, callee: u32, line: u32, cost: u64) {
        let caller_record = &mut self.functions[caller as usize];
        caller_record.summed_inclusive_cost += cost;
        let outbound = caller_record
            .sub_calls
            .entry(EdgeKey { function: callee, line })
            .or_default();
        outbound.call_count += 1;
        outbound.summed_call_cost += cost;

        let callee_record = &mut self.functions[callee as usize];
        let inbound = callee_record
            .called_from
            .entry(EdgeKey { function: caller, line })
            .or_default();
        inbound.call_count += 1;
        inbound.summed_call_cost += cost;
    }

    pub fn enqueue_proxy_call(&mut self, proxy: u32, call: PendingCall) {
        self.proxy_queues.entry(proxy).or_default().push_back(call);
    }

    /// Take the oldest pending call recorded inside a proxy, if any
    pub fn dequeue_proxy_call(&mut self, proxy: u32) -> Option<PendingCall> {
        self.proxy_queues.get_mut(&proxy)?.pop_front()
    }
}

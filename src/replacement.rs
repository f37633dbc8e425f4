// This module turns the thread-independent skeleton into one thread's concrete routine.
// For each worker thread a ReplacementTable is built in a fixed order: the benchmark name,
// then for every declared stream the register claimed for its base pointer followed by its
// size tokens bound to the thread's element counts, then the stream-pointer sentinel bound
// to the backend's pointer loads, then the thread metadata tokens, then the template's
// constants and variables. Stream registers are claimed from the backend's register table
// in order, skipping every register the expanded body already names; running out of
// registers is a configuration error raised before any file is written. The table is
// applied per line, longest key first, so a key that is a substring of a longer key (N
// inside NAME) never corrupts the longer one.

//! Per-thread symbolic replacement.

use hashbrown::HashSet;

use crate::core::error::ConfigError;
use crate::core::template::Template;
use crate::isa::{CodeLines, IsaBackend, STREAM_POINTER_SENTINEL};
use crate::stream::ThreadBinding;

pub const KEY_NAME: &str = "NAME";
pub const KEY_NUM_THREADS: &str = "NUM_THREADS";
pub const KEY_THREAD_ID: &str = "THREAD_ID";
pub const KEY_GROUP_ID: &str = "GROUP_ID";
pub const KEY_ITERATIONS: &str = "ITERATIONS";
pub const KEY_BYTES_PER_ITERATION: &str = "BYTES_PER_ITERATION";

/// Identifier tokens appearing in `lines`, lower-cased.
///
/// A token is a maximal run of ASCII alphanumerics and underscores, which
/// covers register names in every supported assembler syntax.
pub fn used_registers(lines: &[String]) -> HashSet<String> {
    let mut used = HashSet::new();
    for line in lines {
        for token in line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
            if !token.is_empty() {
                used.insert(token.to_ascii_lowercase());
            }
        }
    }
    used
}

/// Claim `count` registers not in `used`, in table order.
pub fn claim_registers(
    backend: &dyn IsaBackend,
    used: &HashSet<String>,
    count: usize,
) -> Result<Vec<&'static str>, ConfigError> {
    let free: Vec<&'static str> = backend
        .registers()
        .iter()
        .copied()
        .filter(|reg| !used.contains(*reg))
        .collect();
    if free.len() < count {
        return Err(ConfigError::RegistersExhausted {
            arch: backend.arch().name(),
            streams: count,
            free: free.len(),
        });
    }
    Ok(free[..count].to_vec())
}

/// Ordered key to value bindings for one thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementTable {
    entries: Vec<(String, String)>,
}

impl ReplacementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// First value bound to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the table for one thread.
    ///
    /// `body` is the expanded body; its registers are never claimed for
    /// streams.
    pub fn for_thread(
        template: &Template,
        backend: &dyn IsaBackend,
        body: &[String],
        binding: &ThreadBinding,
    ) -> Result<Self, ConfigError> {
        if template.streams.len() != binding.streams.len() {
            return Err(ConfigError::StreamCount {
                declared: template.streams.len(),
                bound: binding.streams.len(),
            });
        }
        let used = used_registers(body);
        let registers = claim_registers(backend, &used, template.streams.len())?;

        let mut table = Self::new();
        table.push(KEY_NAME, template.name.as_str());

        let mut loads = Vec::new();
        for ((decl, stream), reg) in template
            .streams
            .iter()
            .zip(&binding.streams)
            .zip(&registers)
        {
            if decl.dims.len() != stream.extents.len() {
                return Err(ConfigError::ExtentMismatch {
                    stream: decl.name.clone(),
                    declared: decl.dims.len(),
                    bound: stream.extents.len(),
                });
            }
            log::trace!(
                "thread {}: stream {} -> {} at 0x{:x} {:?}",
                binding.thread_id,
                decl.name,
                reg,
                stream.pointer,
                stream.extents
            );
            table.push(decl.name.as_str(), *reg);
            for (token, extent) in decl.dims.iter().zip(&stream.extents) {
                table.push(token.as_str(), extent.to_string());
            }
            loads.extend(backend.stream_header(reg, stream.pointer));
        }
        if !template.streams.is_empty() {
            table.push(STREAM_POINTER_SENTINEL, loads.join("\n"));
        }

        table.push(KEY_NUM_THREADS, binding.num_threads.to_string());
        table.push(KEY_THREAD_ID, binding.thread_id.to_string());
        table.push(KEY_GROUP_ID, binding.group_id.to_string());
        table.push(KEY_ITERATIONS, binding.iterations.to_string());
        table.push(KEY_BYTES_PER_ITERATION, binding.bytes_per_iteration.to_string());

        for (key, value) in template.constants.iter().chain(&template.variables) {
            table.push(key.as_str(), value.as_str());
        }
        Ok(table)
    }

    /// Substitute every key in one line, longest keys first.
    pub fn apply_line(&self, line: &str) -> String {
        let max = self.entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        let mut out = line.to_string();
        for len in (1..=max).rev() {
            for (key, value) in self.entries.iter().filter(|(k, _)| k.len() == len) {
                if out.contains(key.as_str()) {
                    out = out.replace(key.as_str(), value);
                }
            }
        }
        out
    }

    /// Apply to every line; multi-line values become separate lines.
    pub fn apply(&self, lines: &[String]) -> CodeLines {
        self.apply_code(lines, None)
    }

    /// Like [`apply`](Self::apply), but lines that are assembler comments
    /// (`prefix` followed by a space) are copied unchanged.
    pub fn apply_code(&self, lines: &[String], comment_prefix: Option<&str>) -> CodeLines {
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            let is_comment = comment_prefix.is_some_and(|prefix| {
                line.trim_start()
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with(' '))
            });
            if is_comment {
                out.push(line.clone());
            } else {
                out.extend(self.apply_line(line).split('\n').map(str::to_string));
            }
        }
        out
    }
}

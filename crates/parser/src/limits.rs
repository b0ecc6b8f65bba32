use std::time::Duration;
use sysinfo::System;

/// Fraction of available system memory the process may occupy before the
/// guard trips, regardless of the configured ceiling.
const AVAILABLE_MEMORY_FRACTION: f64 = 0.8;

/// Resource ceilings for a single bounded parse
#[derive(Debug, Clone)]
pub struct ParseLimits {
    /// Files larger than this are skipped before any read
    pub max_file_size_bytes: u64,

    /// Process RSS ceiling; the effective limit is
    /// `min(this, 0.8 × available system memory)`
    pub max_memory_bytes: u64,

    /// Hard wall-clock ceiling for the isolated parse worker
    pub timeout: Duration,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            max_memory_bytes: 4 * 1024 * 1024 * 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a memory-guard check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStatus {
    WithinLimit,
    Exceeded {
        used_bytes: u64,
        effective_limit_bytes: u64,
    },
}

/// Check current process memory against the effective limit.
///
/// Rust has no collection pass to force, so the guard re-samples once before
/// declaring the limit exceeded; allocator churn between samples is the only
/// relief available.
#[must_use]
pub fn check_memory(max_memory_bytes: u64) -> MemoryStatus {
    match sample_memory(max_memory_bytes) {
        MemoryStatus::WithinLimit => MemoryStatus::WithinLimit,
        MemoryStatus::Exceeded { .. } => sample_memory(max_memory_bytes),
    }
}

fn sample_memory(max_memory_bytes: u64) -> MemoryStatus {
    let mut system = System::new();
    system.refresh_memory();

    let available = system.available_memory();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let dynamic_limit = (available as f64 * AVAILABLE_MEMORY_FRACTION) as u64;
    let effective_limit = max_memory_bytes.min(dynamic_limit.max(1));

    let Ok(pid) = sysinfo::get_current_pid() else {
        // Cannot introspect the process; treat as within limit
        return MemoryStatus::WithinLimit;
    };
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);

    let used = system.process(pid).map_or(0, |p| p.memory());
    if used > effective_limit {
        MemoryStatus::Exceeded {
            used_bytes: used,
            effective_limit_bytes: effective_limit,
        }
    } else {
        MemoryStatus::WithinLimit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generous_limit_is_within() {
        let status = check_memory(u64::MAX);
        assert_eq!(status, MemoryStatus::WithinLimit);
    }

    #[test]
    fn one_byte_limit_is_exceeded() {
        match check_memory(1) {
            MemoryStatus::Exceeded {
                used_bytes,
                effective_limit_bytes,
            } => {
                assert!(used_bytes > effective_limit_bytes);
                assert_eq!(effective_limit_bytes, 1);
            }
            MemoryStatus::WithinLimit => panic!("1-byte limit cannot hold a process"),
        }
    }
}

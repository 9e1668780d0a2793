//! Line-based unified diffs between snapshots.
//!
//! The built-in diff is always available. `git diff --no-index` can be used
//! instead when enabled; it runs with a timeout and any failure falls back to
//! the built-in diff.

use log::{debug, warn};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Above this many LCS table cells the changed region is diffed as a block
const MAX_LCS_CELLS: usize = 16_000_000;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Unified diff of two texts, empty if they are identical
///
/// `context` lines of unchanged text surround each change; hunks whose
/// context would overlap are merged.
pub fn unified_diff(
    old: &str,
    new: &str,
    old_label: &str,
    new_label: &str,
    context: usize,
) -> String {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    let ops = diff_ops(&a, &b);
    if ops.iter().all(|op| *op == Op::Equal) {
        return String::new();
    }

    // Lines of `a` and `b` consumed before each op
    let mut positions = Vec::with_capacity(ops.len() + 1);
    let (mut ai, mut bi) = (0usize, 0usize);
    for op in &ops {
        positions.push((ai, bi));
        match op {
            Op::Equal => {
                ai += 1;
                bi += 1;
            }
            Op::Delete => ai += 1,
            Op::Insert => bi += 1,
        }
    }
    positions.push((ai, bi));

    let mut out = format!("--- a/{}\n+++ b/{}\n", old_label, new_label);
    for (start, end) in hunk_ranges(&ops, context) {
        let a_count = ops[start..end].iter().filter(|op| **op != Op::Insert).count();
        let b_count = ops[start..end].iter().filter(|op| **op != Op::Delete).count();
        let (a_pos, b_pos) = positions[start];
        let a_start = if a_count > 0 { a_pos + 1 } else { a_pos };
        let b_start = if b_count > 0 { b_pos + 1 } else { b_pos };
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            a_start, a_count, b_start, b_count
        ));

        for k in start..end {
            let (a_pos, b_pos) = positions[k];
            let (marker, line) = match ops[k] {
                Op::Equal => (' ', a[a_pos]),
                Op::Delete => ('-', a[a_pos]),
                Op::Insert => ('+', b[b_pos]),
            };
            out.push(marker);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Group changed ops into `[start, end)` ranges padded with context
fn hunk_ranges(ops: &[Op], context: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (k, op) in ops.iter().enumerate() {
        if *op == Op::Equal {
            continue;
        }
        let start = k.saturating_sub(context);
        let end = (k + 1 + context).min(ops.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

fn diff_ops(a: &[&str], b: &[&str]) -> Vec<Op> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut ops = vec![Op::Equal; prefix];
    ops.extend(lcs_ops(
        &a[prefix..a.len() - suffix],
        &b[prefix..b.len() - suffix],
    ));
    ops.extend(std::iter::repeat(Op::Equal).take(suffix));
    ops
}

fn lcs_ops(a: &[&str], b: &[&str]) -> Vec<Op> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 || (n + 1).saturating_mul(m + 1) > MAX_LCS_CELLS {
        if n > 0 && m > 0 {
            debug!("Diff region of {}x{} lines too large for LCS, diffing as a block", n, m);
        }
        let mut ops = vec![Op::Delete; n];
        ops.extend(std::iter::repeat(Op::Insert).take(m));
        return ops;
    }

    // table[i * w + j] = LCS length of a[i..] and b[j..]
    let w = m + 1;
    let mut table = vec![0u32; (n + 1) * w];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * w + j] = if a[i] == b[j] {
                table[(i + 1) * w + j + 1] + 1
            } else {
                table[(i + 1) * w + j].max(table[i * w + j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(Op::Equal);
            i += 1;
            j += 1;
        } else if table[(i + 1) * w + j] >= table[i * w + j + 1] {
            ops.push(Op::Delete);
            i += 1;
        } else {
            ops.push(Op::Insert);
            j += 1;
        }
    }
    ops.extend(std::iter::repeat(Op::Delete).take(n - i));
    ops.extend(std::iter::repeat(Op::Insert).take(m - j));
    ops
}

/// Run `git diff --no-index --unified=1` on two files
///
/// Returns `None` if git is unavailable, fails, or doesn't finish within
/// `timeout` (the process is killed). git exits with 1 when the files differ,
/// which counts as success.
pub fn git_diff(old_path: &Path, new_path: &Path, timeout: Duration) -> Option<String> {
    let mut child = Command::new("git")
        .args(["diff", "--no-index", "--no-color", "--unified=1", "--"])
        .arg(old_path)
        .arg(new_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| debug!("Could not run git diff: {}", e))
        .ok()?;

    let mut stdout = child.stdout.take()?;
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        stdout.read_to_string(&mut buf).map(|_| buf)
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                warn!("git diff did not finish within {:?}, using built-in diff", timeout);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("Failed to wait for git diff: {}", e);
                return None;
            }
        }
    };

    let output = reader.join().ok()?.ok()?;
    match status.code() {
        Some(0) | Some(1) => Some(output),
        code => {
            debug!("git diff exited with {:?}, using built-in diff", code);
            None
        }
    }
}

/// One side of a snapshot diff
#[derive(Debug, Clone, Copy)]
pub struct DiffSide<'a> {
    /// File on disk, used by the external diff
    pub path: &'a Path,
    /// Name shown in the diff header
    pub label: &'a str,
    pub text: &'a str,
}

/// Diff the accepted snapshot against the pending one
///
/// Uses git when `external` is set, both files exist and git succeeds;
/// otherwise the built-in diff with one line of context.
pub fn snapshot_diff(old: DiffSide<'_>, new: DiffSide<'_>, external: bool, timeout: Duration) -> String {
    #[cfg(feature = "tracing")]
    let _span = crate::tracing_helpers::diff_span(external).entered();

    if external && old.path.exists() && new.path.exists() {
        if let Some(diff) = git_diff(old.path, new.path, timeout) {
            return diff;
        }
    }
    unified_diff(old.text, new.text, old.label, new.label, 1)
}

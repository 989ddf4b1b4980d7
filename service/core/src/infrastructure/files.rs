// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! File helpers
//!
//! Plain-file persistence used by agent tooling: single JSON documents,
//! JSON-lines datasets, and UTF-8 text, plus git-root path resolution and
//! JSON value merging. No schema beyond "valid JSON".

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Read a single JSON document.
pub fn read_json(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    debug!("Reading json from {}", path.display());
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Write a single JSON document, pretty-printed.
pub fn write_json(path: impl AsRef<Path>, value: &Value) -> Result<()> {
    let path = path.as_ref();
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))
}

/// Read a JSON-lines file: one JSON value per line, blank lines skipped.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut values = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid JSON on line {} of {}", index + 1, path.display()))?;
        values.push(value);
    }
    Ok(values)
}

/// Write a JSON-lines file: one compact JSON value per line.
pub fn write_jsonl(path: impl AsRef<Path>, values: &[Value]) -> Result<()> {
    let path = path.as_ref();
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for value in values {
        serde_json::to_writer(&mut writer, value)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a plain UTF-8 text file.
pub fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Resolve a path relative to the enclosing git repository root.
pub fn git_path(relative: impl AsRef<Path>) -> Result<PathBuf> {
    git_path_from(None, relative)
}

fn git_path_from(dir: Option<&Path>, relative: impl AsRef<Path>) -> Result<PathBuf> {
    let mut command = Command::new("git");
    command.args(["rev-parse", "--show-toplevel"]);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    let output = command.output().context("Failed to run git")?;

    if !output.status.success() {
        bail!("Not inside a git repository");
    }

    let root = String::from_utf8(output.stdout)
        .map_err(|e| anyhow!("git returned non-UTF-8 output: {}", e))?;
    Ok(PathBuf::from(root.trim()).join(relative))
}

/// Merge `child` into `parent`, key by key.
///
/// Both values must be JSON objects. For keys present on both sides:
/// arrays extend, objects take the child's entries (shallow), numbers add,
/// strings concatenate; any other pairing is replaced by the child value.
/// Keys only in `child` are inserted.
pub fn merge_values(parent: &mut Value, child: &Value) -> Result<()> {
    let (Some(parent_map), Some(child_map)) = (parent.as_object_mut(), child.as_object()) else {
        bail!("merge_values requires two JSON objects");
    };

    for (key, child_value) in child_map {
        match parent_map.get_mut(key) {
            None => {
                parent_map.insert(key.clone(), child_value.clone());
            }
            Some(existing) => match (existing, child_value) {
                (Value::Array(a), Value::Array(b)) => a.extend(b.iter().cloned()),
                (Value::Object(a), Value::Object(b)) => {
                    for (k, v) in b {
                        a.insert(k.clone(), v.clone());
                    }
                }
                (Value::String(a), Value::String(b)) => a.push_str(b),
                (existing, _) => {
                    let replacement = if existing.is_number() && child_value.is_number() {
                        add_numbers(existing, child_value)?
                    } else {
                        child_value.clone()
                    };
                    *existing = replacement;
                }
            },
        }
    }
    Ok(())
}

fn add_numbers(a: &Value, b: &Value) -> Result<Value> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Ok(Value::from(x + y));
    }
    let x = a.as_f64().ok_or_else(|| anyhow!("Not a number: {}", a))?;
    let y = b.as_f64().ok_or_else(|| anyhow!("Not a number: {}", b))?;
    Ok(serde_json::Number::from_f64(x + y)
        .map(Value::Number)
        .unwrap_or(Value::Null))
}

//! Header-bearing CSV test files.
//!
//! ```text
//! test_type,test_id,destination,count,interval,resolve_names
//! ping,1,8.8.8.8,10,0.5,
//! traceroute,2,dns.google,,,false
//! ```
//!
//! Empty cells are absent values, so the constructor's default applies.
//! Quoted cells follow RFC 4180 on a single line: `"a,b"` and `"say ""hi"""`.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::ImportSource;
use crate::coerce::RawRecord;
use crate::error::{AntError, Result};
use crate::model::{registry, TestDefinition};

pub struct CsvImportSource {
    path: PathBuf,
    queue: VecDeque<TestDefinition>,
}

impl CsvImportSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            queue: VecDeque::new(),
        }
    }
}

#[async_trait::async_trait]
impl ImportSource for CsvImportSource {
    async fn initialise(&mut self) -> Result<()> {
        registry::validate()?;

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AntError::io(&self.path, e))?;
        self.queue = parse_tests(&content)?;

        info!(path = %self.path.display(), tests = self.queue.len(), "imported tests from CSV");
        Ok(())
    }

    async fn next_test(&mut self) -> Result<Option<TestDefinition>> {
        Ok(self.queue.pop_front())
    }
}

/// Parse every row into a typed definition. The first bad row aborts.
pub fn parse_tests(content: &str) -> Result<VecDeque<TestDefinition>> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((header_no, header_line)) = lines.next() else {
        return Ok(VecDeque::new());
    };
    let header: Vec<String> = split_row(header_line.trim_start_matches('\u{feff}'))
        .iter()
        .map(|name| normalize_header(name))
        .collect();

    let mut columns = HashSet::new();
    if let Some(repeated) = header.iter().find(|name| !columns.insert(name.as_str())) {
        return Err(AntError::InvalidParameter {
            field: "header".to_string(),
            value: repeated.clone(),
            target: "column names unique after aliasing",
        }
        .at_line(header_no));
    }

    let unknown: BTreeSet<&str> = header
        .iter()
        .map(String::as_str)
        .filter(|name| !registry::is_known_field(name))
        .collect();
    if !unknown.is_empty() {
        warn!(columns = ?unknown, "ignoring columns no test kind uses");
    }

    let mut tests = VecDeque::new();
    let mut seen_ids = HashSet::new();

    for (line_no, line) in lines {
        let cells = split_row(line);
        if cells.len() != header.len() {
            return Err(AntError::InvalidParameter {
                field: "row".to_string(),
                value: format!("{} cells", cells.len()),
                target: "one cell per header column",
            }
            .at_line(line_no));
        }

        let record = clean_record(&header, cells);
        let test = registry::build(&record).map_err(|e| e.at_line(line_no))?;

        if !seen_ids.insert(test.id()) {
            return Err(AntError::InvalidParameter {
                field: "id".to_string(),
                value: test.id().to_string(),
                target: "id unique within the file",
            }
            .at_line(line_no));
        }
        tests.push_back(test);
    }

    Ok(tests)
}

fn normalize_header(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    match name.as_str() {
        "test_id" => "id".to_string(),
        "test_type" => "kind".to_string(),
        _ => name,
    }
}

/// Build a record from one row. Empty cells are left out, which makes them absent.
fn clean_record(header: &[String], cells: Vec<String>) -> RawRecord {
    let mut record = RawRecord::new();
    for (name, cell) in header.iter().zip(cells) {
        if !cell.trim().is_empty() {
            record.insert(name, cell);
        }
    }
    record
}

/// Split one CSV line into cells, honouring double-quoted cells.
fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}

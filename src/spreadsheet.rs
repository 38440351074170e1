//! Spreadsheet mirror of the registrations.
//!
//! The file is a single `.xlsx` workbook rewritten in full on every append.
//! All operations on one [`SpreadsheetStore`] are serialised through an async
//! mutex; nothing guards against a second process writing the same file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use calamine::{open_workbook, Reader, Xlsx};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rust_xlsxwriter::{Color, Format, Workbook};
use serde::{ser::SerializeMap, Serialize, Serializer};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const SHEET_NAME: &str = "Registrations";

pub const HEADERS: [&str; 15] = [
    "First Name",
    "Last Name",
    "Email",
    "Phone",
    "Date of Birth",
    "Gender",
    "Street",
    "City",
    "State",
    "Zip Code",
    "Country",
    "Interests",
    "Newsletter",
    "Registration Date",
    "Last Updated",
];

/// One record's values, in [`HEADERS`] order.
pub type ProjectedRow = [String; HEADERS.len()];

const COLUMN_WIDTH: f64 = 15.0;

lazy_static! {
    /// OOXML `ST_Xstring` escape, e.g. `_x005F_` for a literal underscore.
    static ref XSTRING_ESCAPE: Regex = Regex::new(r"_x([0-9A-Fa-f]{4})_").unwrap();
}
const HEADER_FILL: u32 = 0xE0E0E0;
const STRIPE_FILL: u32 = 0xF8F8F8;

/// A data row read back from the file, keyed by header in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    cells: Vec<(String, String)>,
}

impl SheetRow {
    #[cfg(test)]
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, v)| v.as_str())
    }
}

impl Serialize for SheetRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (header, value) in &self.cells {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub total_registrations: usize,
    pub file_size: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
    pub file_path: String,
}

pub struct SpreadsheetStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SpreadsheetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    /// Creates the file with its header row when absent. An existing file is
    /// left untouched. Returns whether a file was created.
    pub async fn initialize(&self) -> anyhow::Result<bool> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        run_blocking(move || {
            if path.exists() {
                return Ok(false);
            }
            create_with_header(&path)?;
            info!(path = %path.display(), "spreadsheet initialized");
            Ok(true)
        })
        .await
    }

    /// Appends one row and rewrites the file. Returns the 1-based sheet row
    /// number the record landed on.
    pub async fn append_row(&self, row: ProjectedRow) -> anyhow::Result<usize> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        run_blocking(move || {
            if !path.exists() {
                create_with_header(&path)?;
            }
            let mut grid = load_grid(&path)?;
            grid.push(row.to_vec());
            write_workbook(&path, &grid)?;
            debug!(path = %path.display(), row = grid.len(), "spreadsheet row appended");
            Ok(grid.len())
        })
        .await
    }

    /// Every data row, header excluded. Empty when the file does not exist.
    pub async fn read_all_rows(&self) -> anyhow::Result<Vec<SheetRow>> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        run_blocking(move || read_rows(&path)).await
    }

    pub async fn file_stats(&self) -> anyhow::Result<FileStats> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        run_blocking(move || {
            let file_path = path.display().to_string();
            if !path.exists() {
                return Ok(FileStats {
                    total_registrations: 0,
                    file_size: 0,
                    last_modified: None,
                    file_path,
                });
            }
            let meta = std::fs::metadata(&path)
                .with_context(|| format!("stat {}", path.display()))?;
            let last_modified = meta.modified().ok().map(OffsetDateTime::from);
            Ok(FileStats {
                total_registrations: read_rows(&path)?.len(),
                file_size: meta.len(),
                last_modified,
                file_path,
            })
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("spreadsheet task panicked")?
}

fn create_with_header(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    write_workbook(path, &[header])
}

/// All non-empty rows of the sheet, header first, as display strings.
fn load_grid(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("open {}", path.display()))?;
    let range = match workbook.worksheet_range(SHEET_NAME) {
        Ok(range) => range,
        Err(_) => workbook
            .worksheet_range_at(0)
            .context("workbook has no worksheets")?
            .with_context(|| format!("read first worksheet of {}", path.display()))?,
    };

    Ok(range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| unescape_xstring(&cell.to_string()))
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|v| !v.is_empty()))
        .collect())
}

/// Reverses the `_xHHHH_` escaping the writer applies, so a rewrite stores the
/// original text again instead of escaping it a second time.
fn unescape_xstring(raw: &str) -> String {
    if !raw.contains("_x") {
        return raw.to_string();
    }
    XSTRING_ESCAPE
        .replace_all(raw, |caps: &Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<SheetRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut grid = load_grid(path)?.into_iter();
    let Some(header) = grid.next() else {
        return Ok(Vec::new());
    };

    Ok(grid
        .map(|values| SheetRow {
            cells: header
                .iter()
                .enumerate()
                .filter(|(_, h)| !h.is_empty())
                .map(|(i, h)| (h.clone(), values.get(i).cloned().unwrap_or_default()))
                .collect(),
        })
        .collect())
}

/// Writes `grid` (header first) to a sibling temp file and renames it over
/// `path`, so readers never observe a half-written workbook.
fn write_workbook(path: &Path, grid: &[Vec<String>]) -> anyhow::Result<()> {
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL));
    let stripe_format = Format::new().set_background_color(Color::RGB(STRIPE_FILL));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for col in 0..width {
        sheet.set_column_width(col as u16, COLUMN_WIDTH)?;
    }

    for (r, values) in grid.iter().enumerate() {
        let row_num = r as u32;
        // sheet rows are 1-based; even ones get the stripe
        let format = if r == 0 {
            Some(&header_format)
        } else if (r + 1) % 2 == 0 {
            Some(&stripe_format)
        } else {
            None
        };
        for (c, value) in values.iter().enumerate() {
            let col = c as u16;
            match (value.is_empty(), format) {
                (true, Some(f)) => {
                    sheet.write_blank(row_num, col, f)?;
                }
                (true, None) => {}
                (false, Some(f)) => {
                    sheet.write_string_with_format(row_num, col, value, f)?;
                }
                (false, None) => {
                    sheet.write_string(row_num, col, value)?;
                }
            }
        }
    }

    let file_name = path
        .file_name()
        .context("spreadsheet path has no file name")?
        .to_string_lossy();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    workbook
        .save(&tmp)
        .with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

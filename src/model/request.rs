use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Extension given to converted documents.
pub const DOCX_EXTENSION: &str = "docx";

/// Zero-based page window: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// First page to convert (0-based)
    pub start: u32,
    /// Page to stop before (0-based, `None` = until the last page)
    pub end: Option<u32>,
}

impl PageRange {
    /// Every page of the document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Pages `start..end`, validated.
    pub fn new(start: u32, end: Option<u32>) -> Result<Self> {
        if let Some(end) = end {
            if end <= start {
                return Err(Error::InvalidPageRange(format!(
                    "end page {} must be greater than start page {}",
                    end, start
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Whether the zero-based page `index` falls inside the window.
    pub fn includes(&self, index: u32) -> bool {
        index >= self.start && self.end.map_or(true, |end| index < end)
    }

    /// Whether this covers the whole document.
    pub fn is_all(&self) -> bool {
        self.start == 0 && self.end.is_none()
    }

    /// Parse `"START-END"`, `"START-"` or `"all"`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }

        let invalid = || Error::InvalidPageRange(s.to_string());
        let (start, end) = s.split_once('-').ok_or_else(invalid)?;
        let start: u32 = start.trim().parse().map_err(|_| invalid())?;
        let end = match end.trim() {
            "" => None,
            e => Some(e.parse::<u32>().map_err(|_| invalid())?),
        };
        Self::new(start, end)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{} to {}", self.start + 1, end),
            None => write!(f, "{} to end", self.start + 1),
        }
    }
}

/// A single PDF → DOCX conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    input: PathBuf,
    output: PathBuf,
    pages: PageRange,
    verbose: bool,
}

impl ConversionRequest {
    /// Convert `input` next to itself, as `<stem>.docx`.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        let input = input.into();
        let output = default_output_path(&input);
        Self {
            input,
            output,
            pages: PageRange::all(),
            verbose: false,
        }
    }

    /// Set the output path.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Set the page window.
    pub fn with_pages(mut self, pages: PageRange) -> Self {
        self.pages = pages;
        self
    }

    /// Log progress at info level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn pages(&self) -> PageRange {
        self.pages
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Input file name for logs and batch reports.
    pub fn display_name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}

/// Same stem as `input`, `.docx` extension.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension(DOCX_EXTENSION)
}

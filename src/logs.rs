use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::command::TransferRequest;
use crate::error::DistributorError;
use crate::retry::TransferOutcome;

pub const SIGNATURE_PARSE_PLACEHOLDER: &str = "Error parsing signature - check the detailed logs.";
/// Written to the transcript after each recipient's entry.
pub const ENTRY_SEPARATOR: &str = "------------------------------";

/// Where a run's log files go and what they are called.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLayout {
    pub base_dir: PathBuf,
    pub folder_prefix: String,
    pub success: String,
    pub failed: String,
    pub canceled: String,
    pub unconfirmed: String,
    pub detailed: String,
}

impl Default for LogLayout {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            folder_prefix: "logs-".to_string(),
            success: "success.log".to_string(),
            failed: "failed.log".to_string(),
            canceled: "canceled.log".to_string(),
            unconfirmed: "unconfirmed.log".to_string(),
            detailed: "detailed.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Success,
    Canceled,
    Failed,
    Unconfirmed,
    Detailed,
}

impl LogStream {
    pub const ALL: [LogStream; 5] = [
        LogStream::Success,
        LogStream::Canceled,
        LogStream::Failed,
        LogStream::Unconfirmed,
        LogStream::Detailed,
    ];

    fn header(self) -> Option<&'static str> {
        match self {
            LogStream::Success => Some("recipient,amount,signature"),
            LogStream::Canceled => Some("recipient,amount"),
            LogStream::Failed | LogStream::Unconfirmed => Some("recipient,amount,error"),
            LogStream::Detailed => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LogStream::Success => "Successful",
            LogStream::Canceled => "Canceled",
            LogStream::Failed => "Failed",
            LogStream::Unconfirmed => "Unconfirmed",
            LogStream::Detailed => "Detailed",
        }
    }

    fn file_name(self, layout: &LogLayout) -> &str {
        match self {
            LogStream::Success => &layout.success,
            LogStream::Canceled => &layout.canceled,
            LogStream::Failed => &layout.failed,
            LogStream::Unconfirmed => &layout.unconfirmed,
            LogStream::Detailed => &layout.detailed,
        }
    }
}

struct StreamFile {
    path: PathBuf,
    file: File,
}

impl StreamFile {
    fn append(&mut self, text: &str) -> Result<(), DistributorError> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|source| DistributorError::Log {
                path: self.path.clone(),
                source,
            })
    }
}

/// The five append-only streams of one run, opened once in a fresh
/// timestamped directory.
pub struct LogWriter {
    dir: PathBuf,
    success: StreamFile,
    canceled: StreamFile,
    failed: StreamFile,
    unconfirmed: StreamFile,
    detailed: StreamFile,
}

impl LogWriter {
    /// Create `<base_dir>/<prefix><timestamp>/` and the stream files in it,
    /// writing the CSV headers.
    ///
    /// Fails if the run directory already exists, so an earlier run's logs
    /// are never overwritten.
    pub fn create(layout: &LogLayout, timestamp: &str) -> Result<Self, DistributorError> {
        fs::create_dir_all(&layout.base_dir).map_err(|source| DistributorError::Log {
            path: layout.base_dir.clone(),
            source,
        })?;
        let dir = layout
            .base_dir
            .join(format!("{}{}", layout.folder_prefix, timestamp));
        fs::create_dir(&dir).map_err(|source| DistributorError::Log {
            path: dir.clone(),
            source,
        })?;

        let open = |stream: LogStream| -> Result<StreamFile, DistributorError> {
            let path = dir.join(stream.file_name(layout));
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|source| DistributorError::Log {
                    path: path.clone(),
                    source,
                })?;

            let mut stream_file = StreamFile { path, file };
            if let Some(header) = stream.header() {
                stream_file.append(&format!("{}\n", header))?;
            }
            Ok(stream_file)
        };

        Ok(Self {
            success: open(LogStream::Success)?,
            canceled: open(LogStream::Canceled)?,
            failed: open(LogStream::Failed)?,
            unconfirmed: open(LogStream::Unconfirmed)?,
            detailed: open(LogStream::Detailed)?,
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, stream: LogStream) -> &Path {
        &self.stream(stream).path
    }

    /// Labelled `tail -f` hints for every stream.
    pub fn describe(&self) -> Vec<String> {
        LogStream::ALL
            .iter()
            .map(|stream| format!("  {} logs: (tail -f {})", stream.label(), self.path(*stream).display()))
            .collect()
    }

    /// Append one row for a terminal outcome to its stream.
    pub fn record(&mut self, request: &TransferRequest, outcome: &TransferOutcome) -> Result<(), DistributorError> {
        let recipient = request.recipient.to_string();
        let amount = &request.amount;

        let (stream, row) = match outcome {
            TransferOutcome::Success { signature } => {
                let signature = signature
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| SIGNATURE_PARSE_PLACEHOLDER.to_string());
                (LogStream::Success, format!("{},{},{}", recipient, amount, signature))
            }
            TransferOutcome::Canceled => (LogStream::Canceled, format!("{},{}", recipient, amount)),
            TransferOutcome::Unconfirmed(error) => (
                LogStream::Unconfirmed,
                format!("{},{},{}", recipient, amount, single_line(error)),
            ),
            TransferOutcome::Failed(error) => (
                LogStream::Failed,
                format!("{},{},{}", recipient, amount, single_line(error)),
            ),
        };

        self.stream_mut(stream).append(&format!("{}\n", row))
    }

    /// Append raw text to the transcript; a newline is added when missing.
    pub fn transcript(&mut self, text: &str) -> Result<(), DistributorError> {
        if text.is_empty() {
            return Ok(());
        }
        let detailed = self.stream_mut(LogStream::Detailed);
        if text.ends_with('\n') {
            detailed.append(text)
        } else {
            detailed.append(&format!("{}\n", text))
        }
    }

    pub fn end_entry(&mut self) -> Result<(), DistributorError> {
        self.transcript(ENTRY_SEPARATOR)
    }

    fn stream(&self, stream: LogStream) -> &StreamFile {
        match stream {
            LogStream::Success => &self.success,
            LogStream::Canceled => &self.canceled,
            LogStream::Failed => &self.failed,
            LogStream::Unconfirmed => &self.unconfirmed,
            LogStream::Detailed => &self.detailed,
        }
    }

    fn stream_mut(&mut self, stream: LogStream) -> &mut StreamFile {
        match stream {
            LogStream::Success => &mut self.success,
            LogStream::Canceled => &mut self.canceled,
            LogStream::Failed => &mut self.failed,
            LogStream::Unconfirmed => &mut self.unconfirmed,
            LogStream::Detailed => &mut self.detailed,
        }
    }
}

/// Timestamp used in the log folder name.
pub fn run_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d-%H%M%S").to_string()
}

// rows must stay on one line; the raw text is in the transcript
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

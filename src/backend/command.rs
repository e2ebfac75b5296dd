//! Rich converter backed by an external `pdf2docx` program.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::detect::detect_format_from_path;
use crate::error::{Error, Result};

use super::{RenderSettings, RichConverter, RichDocument};

/// Program invoked when none is configured.
pub const DEFAULT_CONVERTER_PROGRAM: &str = "pdf2docx";

/// Runs `<program> convert <input> <output> [--start=N] [--end=N]`.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    extra_args: Vec<OsString>,
    no_image_args: Vec<OsString>,
}

impl CommandConverter {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_CONVERTER_PROGRAM),
            extra_args: Vec::new(),
            no_image_args: Vec::new(),
        }
    }

    /// Use a different executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments appended to every invocation.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments appended when image extraction is disabled.
    pub fn with_no_image_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.no_image_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command_args(&self, input: &Path, output: &Path, settings: &RenderSettings) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "convert".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ];
        if settings.pages.start > 0 {
            args.push(format!("--start={}", settings.pages.start).into());
        }
        if let Some(end) = settings.pages.end {
            args.push(format!("--end={}", end).into());
        }
        if settings.skip_images {
            if self.no_image_args.is_empty() {
                log::debug!(
                    "{} has no image switch configured; images stay enabled",
                    self.program.display()
                );
            }
            args.extend(self.no_image_args.iter().cloned());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

impl Default for CommandConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl RichConverter for CommandConverter {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_CONVERTER_PROGRAM)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RichDocument>> {
        let format = detect_format_from_path(path)?;
        log::debug!("Opened {} ({})", path.display(), format);
        Ok(Box::new(CommandDocument {
            converter: self.clone(),
            input: path.to_path_buf(),
        }))
    }

    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

struct CommandDocument {
    converter: CommandConverter,
    input: PathBuf,
}

impl RichDocument for CommandDocument {
    fn render(&mut self, output: &Path, settings: &RenderSettings) -> Result<()> {
        let program = &self.converter.program;
        let args = self.converter.command_args(&self.input, output, settings);
        log::debug!("Running {} {:?}", program.display(), args);

        let result = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(program, e))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::ConversionFailed(describe_failure(
                program,
                result.status,
                stderr.trim(),
            )));
        }

        if !output.exists() {
            return Err(Error::ConversionFailed(format!(
                "{} exited successfully but wrote no output to {}",
                program.display(),
                output.display()
            )));
        }
        Ok(())
    }
}

fn spawn_error(program: &Path, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::ConversionFailed(format!(
            "{} is not installed or not on PATH (install with: pip install pdf2docx)",
            program.display()
        )),
        io::ErrorKind::PermissionDenied => Error::ConversionFailed(format!(
            "{} cannot be executed (check its file mode)",
            program.display()
        )),
        _ => Error::Io(err),
    }
}

fn describe_failure(program: &Path, status: ExitStatus, stderr: &str) -> String {
    let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty());
    let exit = exit_description(status);
    match last_line {
        Some(line) => format!("{} {}: {}", program.display(), exit, line.trim()),
        None => format!("{} {}", program.display(), exit),
    }
}

#[cfg(unix)]
fn exit_description(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        // SIGKILL is what the kernel OOM killer sends
        Some(9) => "was killed by signal 9 (likely out of memory)".to_string(),
        Some(sig) => format!("was killed by signal {}", sig),
        None => format!("exited with {}", status),
    }
}

#[cfg(not(unix))]
fn exit_description(status: ExitStatus) -> String {
    format!("exited with {}", status)
}

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::config::{ConverterSettings, OverwritePolicy};
use crate::converter::process::{run_with_timeout, wait_for_output};
use crate::converter::{ConvertOutcome, Converter, ConverterBackend};
use crate::error::ConvertError;
use crate::worker::job::{is_hwp, is_hwp_family};

/// How long to wait for an output file after the converter exits.
#[derive(Debug, Clone, Copy)]
pub struct OutputSettle {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for OutputSettle {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(200),
        }
    }
}

/// Backend that runs the configured converter executables.
pub struct ExternalConverter {
    settings: Arc<ConverterSettings>,
    settle: OutputSettle,
}

impl ExternalConverter {
    pub fn new(settings: ConverterSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            settle: OutputSettle::default(),
        }
    }

    pub fn with_settle(mut self, settle: OutputSettle) -> Self {
        self.settle = settle;
        self
    }
}

impl ConverterBackend for ExternalConverter {
    fn acquire(&self) -> Result<Box<dyn Converter>, ConvertError> {
        Ok(Box::new(ExternalSession {
            settings: Arc::clone(&self.settings),
            settle: self.settle,
            conversions: 0,
        }))
    }
}

struct ExternalSession {
    settings: Arc<ConverterSettings>,
    settle: OutputSettle,
    conversions: u32,
}

impl ExternalSession {
    fn run(&mut self, cmd: Command, source: &Path, output: &Path) -> Result<(), ConvertError> {
        let result = run_with_timeout(cmd, self.settings.timeout, source)?;
        self.conversions += 1;

        if !result.status.success() {
            return Err(ConvertError::ConversionFailed {
                path: source.to_path_buf(),
                reason: result.describe_failure(),
            });
        }

        if !wait_for_output(output, self.settle.attempts, self.settle.interval) {
            return Err(ConvertError::OutputMissing(output.to_path_buf()));
        }
        Ok(())
    }
}

impl Converter for ExternalSession {
    fn convert_to_hwpx(
        &mut self,
        source: &Path,
        policy: OverwritePolicy,
    ) -> Result<ConvertOutcome, ConvertError> {
        if !is_hwp(source) || !source.is_file() {
            return Err(ConvertError::UnsupportedSource(source.to_path_buf()));
        }

        let target = source.with_extension("hwpx");
        if let Some(outcome) = prepare_target(&target, policy)? {
            return Ok(outcome);
        }

        let exe = &self.settings.hwpx_converter_path;
        if !exe.is_file() {
            return Err(ConvertError::ApplicationNotFound { path: exe.clone() });
        }

        let mut cmd = Command::new(exe);
        cmd.arg(source);
        self.run(cmd, source, &target)?;

        info!("Converted {} to HWPX", file_name(source));
        Ok(ConvertOutcome::Converted(target))
    }

    fn convert_to_pdf(
        &mut self,
        source: &Path,
        output_dir: &Path,
        policy: OverwritePolicy,
    ) -> Result<ConvertOutcome, ConvertError> {
        if !is_hwp_family(source) || !source.is_file() {
            return Err(ConvertError::UnsupportedSource(source.to_path_buf()));
        }

        let exe = self.settings.pdf_converter_path.clone().ok_or_else(|| {
            ConvertError::NotConfigured("no PDF converter executable is set".to_string())
        })?;
        if !exe.is_file() {
            return Err(ConvertError::ApplicationNotFound { path: exe });
        }

        std::fs::create_dir_all(output_dir).map_err(|e| ConvertError::Io {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let stem = source
            .file_stem()
            .ok_or_else(|| ConvertError::UnsupportedSource(source.to_path_buf()))?;
        let mut target = output_dir.join(stem);
        target.set_extension("pdf");

        if let Some(outcome) = prepare_target(&target, policy)? {
            return Ok(outcome);
        }

        let mut cmd = Command::new(&exe);
        cmd.args(expand_args(
            &self.settings.pdf_converter_args,
            source,
            &target,
            output_dir,
            &self.settings.pdf_printer,
        ));
        self.run(cmd, source, &target)?;

        info!("Converted {} to PDF", file_name(source));
        Ok(ConvertOutcome::Converted(target))
    }
}

impl Drop for ExternalSession {
    fn drop(&mut self) {
        debug!(
            "Converter session closed after {} conversion(s)",
            self.conversions
        );
    }
}

/// Applies the overwrite policy. `Some` means the conversion is skipped.
fn prepare_target(
    target: &Path,
    policy: OverwritePolicy,
) -> Result<Option<ConvertOutcome>, ConvertError> {
    if !target.exists() {
        return Ok(None);
    }

    match policy {
        OverwritePolicy::Skip => {
            debug!("{} already exists, skipping", target.display());
            Ok(Some(ConvertOutcome::Skipped(target.to_path_buf())))
        }
        OverwritePolicy::Overwrite => {
            // Removed up front so a converter that silently does nothing is detected
            std::fs::remove_file(target).map_err(|e| ConvertError::Io {
                path: target.to_path_buf(),
                source: e,
            })?;
            Ok(None)
        }
    }
}

/// Substitutes `{input}`, `{output}`, `{output_dir}` and `{printer}`.
pub fn expand_args(
    templates: &[String],
    input: &Path,
    output: &Path,
    output_dir: &Path,
    printer: &str,
) -> Vec<String> {
    templates
        .iter()
        .map(|arg| {
            arg.replace("{input}", &input.display().to_string())
                .replace("{output_dir}", &output_dir.display().to_string())
                .replace("{output}", &output.display().to_string())
                .replace("{printer}", printer)
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn settings(dir: &Path) -> ConverterSettings {
        ConverterSettings {
            hwpx_converter_path: dir.join("missing-hwpx"),
            pdf_converter_path: None,
            pdf_converter_args: vec!["{input}".to_string(), "{output}".to_string()],
            pdf_printer: "Hancom PDF".to_string(),
            timeout: Duration::from_secs(10),
            on_output_exists: OverwritePolicy::Overwrite,
        }
    }

    fn fast_settle() -> OutputSettle {
        OutputSettle {
            attempts: 3,
            interval: Duration::from_millis(20),
        }
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_expand_args() {
        let args = expand_args(
            &[
                "-i".to_string(),
                "{input}".to_string(),
                "--out={output}".to_string(),
                "{output_dir}".to_string(),
                "/p:{printer}".to_string(),
            ],
            Path::new("/in/a.hwp"),
            Path::new("/out/a.pdf"),
            Path::new("/out"),
            "Hancom PDF",
        );
        assert_eq!(
            args,
            vec!["-i", "/in/a.hwp", "--out=/out/a.pdf", "/out", "/p:Hancom PDF"]
        );
    }

    #[test]
    fn test_hwpx_rejects_non_hwp() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.docx");
        std::fs::write(&source, "x").unwrap();

        let backend = ExternalConverter::new(settings(dir.path()));
        let mut session = backend.acquire().unwrap();
        assert!(matches!(
            session.convert_to_hwpx(&source, OverwritePolicy::Overwrite),
            Err(ConvertError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_hwpx_missing_application() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.hwp");
        std::fs::write(&source, "x").unwrap();

        let backend = ExternalConverter::new(settings(dir.path()));
        let mut session = backend.acquire().unwrap();
        assert!(matches!(
            session.convert_to_hwpx(&source, OverwritePolicy::Overwrite),
            Err(ConvertError::ApplicationNotFound { .. })
        ));
    }

    #[test]
    fn test_pdf_not_configured() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.hwpx");
        std::fs::write(&source, "x").unwrap();

        let backend = ExternalConverter::new(settings(dir.path()));
        let mut session = backend.acquire().unwrap();
        assert!(matches!(
            session.convert_to_pdf(&source, dir.path(), OverwritePolicy::Overwrite),
            Err(ConvertError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_skip_existing_output() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.hwp");
        let existing = dir.path().join("a.hwpx");
        std::fs::write(&source, "x").unwrap();
        std::fs::write(&existing, "old").unwrap();

        let backend = ExternalConverter::new(settings(dir.path()));
        let mut session = backend.acquire().unwrap();
        let outcome = session
            .convert_to_hwpx(&source, OverwritePolicy::Skip)
            .unwrap();

        assert_eq!(outcome, ConvertOutcome::Skipped(existing.clone()));
        assert_eq!(std::fs::read_to_string(existing).unwrap(), "old");
    }

    #[cfg(unix)]
    #[test]
    fn test_hwpx_conversion_with_script() {
        let dir = TempDir::new().unwrap();
        let exe = script(dir.path(), "hwpx.sh", r#"cp "$1" "${1%.hwp}.hwpx""#);
        let source = dir.path().join("240305_견적서.hwp");
        std::fs::write(&source, "hwp body").unwrap();

        let mut config = settings(dir.path());
        config.hwpx_converter_path = exe;
        let backend = ExternalConverter::new(config).with_settle(fast_settle());
        let mut session = backend.acquire().unwrap();

        let outcome = session
            .convert_to_hwpx(&source, OverwritePolicy::Overwrite)
            .unwrap();
        let expected = dir.path().join("240305_견적서.hwpx");
        assert_eq!(outcome, ConvertOutcome::Converted(expected.clone()));
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "hwp body");
    }

    #[cfg(unix)]
    #[test]
    fn test_pdf_conversion_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let exe = script(dir.path(), "pdf.sh", r#"cp "$1" "$2""#);
        let source = dir.path().join("a.hwpx");
        std::fs::write(&source, "hwpx body").unwrap();
        let out_dir = dir.path().join("pdf").join("nested");

        let mut config = settings(dir.path());
        config.pdf_converter_path = Some(exe);
        let backend = ExternalConverter::new(config).with_settle(fast_settle());
        let mut session = backend.acquire().unwrap();

        let outcome = session
            .convert_to_pdf(&source, &out_dir, OverwritePolicy::Overwrite)
            .unwrap();
        assert_eq!(outcome, ConvertOutcome::Converted(out_dir.join("a.pdf")));
        assert!(out_dir.join("a.pdf").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_exit_is_conversion_failure() {
        let dir = TempDir::new().unwrap();
        let exe = script(dir.path(), "fail.sh", "echo 'cannot open' >&2\nexit 2");
        let source = dir.path().join("a.hwp");
        std::fs::write(&source, "x").unwrap();

        let mut config = settings(dir.path());
        config.hwpx_converter_path = exe;
        let backend = ExternalConverter::new(config).with_settle(fast_settle());
        let mut session = backend.acquire().unwrap();

        match session.convert_to_hwpx(&source, OverwritePolicy::Overwrite) {
            Err(ConvertError::ConversionFailed { reason, .. }) => {
                assert!(reason.contains("cannot open"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_converter_is_output_missing() {
        let dir = TempDir::new().unwrap();
        let exe = script(dir.path(), "noop.sh", "exit 0");
        let source = dir.path().join("a.hwp");
        std::fs::write(&source, "x").unwrap();
        std::fs::write(dir.path().join("a.hwpx"), "stale").unwrap();

        let mut config = settings(dir.path());
        config.hwpx_converter_path = exe;
        let backend = ExternalConverter::new(config).with_settle(fast_settle());
        let mut session = backend.acquire().unwrap();

        assert!(matches!(
            session.convert_to_hwpx(&source, OverwritePolicy::Overwrite),
            Err(ConvertError::OutputMissing(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let exe = script(dir.path(), "hang.sh", "sleep 10");
        let source = dir.path().join("a.hwp");
        std::fs::write(&source, "x").unwrap();

        let mut config = settings(dir.path());
        config.hwpx_converter_path = exe;
        config.timeout = Duration::from_millis(300);
        let backend = ExternalConverter::new(config).with_settle(fast_settle());
        let mut session = backend.acquire().unwrap();

        let err = session
            .convert_to_hwpx(&source, OverwritePolicy::Overwrite)
            .unwrap_err();
        assert!(err.requires_recycle());
    }
}

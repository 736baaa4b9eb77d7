use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::{debug, info, info_span, warn};

use crate::config::DateSource;
use crate::converter::{ConvertOutcome, ConverterLease};
use crate::dater::DateHeader;
use crate::error::RenameError;
use crate::sanitize;
use crate::status::JobPhase;
use crate::worker::job::{is_hwp_family, JobKind, JobResult, JobStatus};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{ProgressEvent, ProgressReporter};
use super::rename::{free_target_name, rename_with_retry};

pub struct Pipeline {
    config: Arc<PipelineConfig>,
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    /// Run the full pipeline for a single job.
    /// Returns a (JobResult, PipelineContext) pair.
    pub fn run(
        &self,
        mut ctx: PipelineContext,
        lease: &mut ConverterLease,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        let filename = sanitize::redact_path(&ctx.job.source_path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.job.id,
            filename = %filename,
            kind = %ctx.job.kind,
        )
        .entered();
        ctx.job.status = JobStatus::Running;

        // Step 1: Rename
        if ctx.job.kind != JobKind::PdfConvert {
            let _step = info_span!("rename").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Renaming,
                message: "Adding date header".to_string(),
            });
            if let Err(e) = self.step_rename(&mut ctx) {
                return self.fail(ctx, JobPhase::Renaming, e, lease, progress);
            }
        }

        // Step 2: HWP -> HWPX
        if ctx.job.kind == JobKind::RenameAndHwpx {
            let _step = info_span!("convert_hwpx").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::ConvertingHwpx,
                message: "Converting to HWPX".to_string(),
            });
            if let Err(e) = self.step_convert_hwpx(&mut ctx, lease) {
                return self.fail(ctx, JobPhase::ConvertingHwpx, e, lease, progress);
            }
        }

        // Step 3: PDF
        if self.wants_pdf(&ctx) {
            let _step = info_span!("convert_pdf").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::ConvertingPdf,
                message: "Converting to PDF".to_string(),
            });
            if let Err(e) = self.step_convert_pdf(&mut ctx, lease) {
                return self.fail(ctx, JobPhase::ConvertingPdf, e, lease, progress);
            }
        }

        let final_path = match ctx.job.kind {
            JobKind::PdfConvert => None,
            _ => Some(
                ctx.renamed_path
                    .clone()
                    .unwrap_or_else(|| ctx.job.source_path.clone()),
            ),
        };
        ctx.job.status = JobStatus::Done;
        let warnings = ctx.warning_messages();
        let result = JobResult::success(
            &ctx.job,
            final_path,
            ctx.hwpx_path.clone(),
            ctx.pdf_path.clone(),
            warnings,
        );

        info!("Finished {} ({})", filename, ctx.job.kind);
        progress.report(ProgressEvent::Completed {
            final_path: result.final_path.clone(),
            outputs: result.outputs(),
            warnings: result.warnings.clone(),
        });

        (result, ctx)
    }

    fn fail(
        &self,
        mut ctx: PipelineContext,
        phase: JobPhase,
        error: PipelineError,
        lease: &mut ConverterLease,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        warn!("{} failed while {}: {}", ctx.job.filename(), phase, error);
        ctx.job.status = JobStatus::Failed;
        if error.requires_recycle() {
            lease.recycle();
        }

        let err_msg = error.to_string();
        progress.report(ProgressEvent::Failed {
            phase,
            error: err_msg.clone(),
        });
        let result = JobResult::failure(&ctx.job, phase, err_msg, ctx.warning_messages());
        (result, ctx)
    }

    fn wants_pdf(&self, ctx: &PipelineContext) -> bool {
        match ctx.job.kind {
            JobKind::PdfConvert => true,
            JobKind::RenameAndHwpx => self.config.auto_convert_pdf,
            JobKind::RenameOnly => {
                self.config.auto_convert_pdf && is_hwp_family(&ctx.current_path)
            }
        }
    }

    fn step_rename(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let source = ctx.current_path.clone();
        if !source.exists() {
            return Err(RenameError::SourceMissing(source).into());
        }

        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RenameError::InvalidName(source.clone()))?;
        let directory = source
            .parent()
            .ok_or_else(|| RenameError::InvalidName(source.clone()))?;

        let header = self.date_header_for(&source);
        let new_name = self.config.dater.apply(name, header);
        if new_name == name {
            debug!("{} already carries a date header", name);
            return Ok(());
        }

        let target = free_target_name(directory, &new_name)?;
        rename_with_retry(&source, &target, &self.config.retry)?;

        debug!(
            "Renamed {} -> {}",
            sanitize::redact_path(&source),
            sanitize::redact_path(&target)
        );
        ctx.renamed_path = Some(target.clone());
        ctx.current_path = target;
        Ok(())
    }

    fn step_convert_hwpx(
        &self,
        ctx: &mut PipelineContext,
        lease: &mut ConverterLease,
    ) -> Result<(), PipelineError> {
        let source = ctx.current_path.clone();
        let outcome = lease
            .get()?
            .convert_to_hwpx(&source, self.config.on_output_exists)?;

        match outcome {
            ConvertOutcome::Converted(hwpx) => {
                if self.config.delete_hwp_after_hwpx {
                    match std::fs::remove_file(&source) {
                        Ok(()) => debug!("Deleted {}", sanitize::redact_path(&source)),
                        Err(e) => {
                            warn!("Failed to delete {}: {}", source.display(), e);
                            ctx.warnings.push(PipelineWarning::SourceNotDeleted {
                                path: source.clone(),
                                error: e.to_string(),
                            });
                        }
                    }
                }
                ctx.hwpx_path = Some(hwpx);
            }
            ConvertOutcome::Skipped(hwpx) => {
                ctx.warnings
                    .push(PipelineWarning::OutputKept { path: hwpx.clone() });
                ctx.hwpx_path = Some(hwpx);
            }
        }
        Ok(())
    }

    fn step_convert_pdf(
        &self,
        ctx: &mut PipelineContext,
        lease: &mut ConverterLease,
    ) -> Result<(), PipelineError> {
        // Convert from the HWPX when one was just produced; the HWP may be gone
        let source = ctx
            .hwpx_path
            .clone()
            .unwrap_or_else(|| ctx.current_path.clone());
        let output_dir = self.config.pdf_dir_for(&source);

        let outcome = lease.get()?.convert_to_pdf(
            &source,
            &output_dir,
            self.config.on_output_exists,
        )?;

        if outcome.was_skipped() {
            ctx.warnings.push(PipelineWarning::OutputKept {
                path: outcome.path().to_path_buf(),
            });
        }
        ctx.pdf_path = Some(outcome.into_path());
        Ok(())
    }

    fn date_header_for(&self, path: &Path) -> DateHeader {
        match self.config.date_source {
            DateSource::Today => DateHeader::today(),
            DateSource::FileTime => newest_file_time(path)
                .map(|time| DateHeader::new(DateTime::<Local>::from(time).date_naive()))
                .unwrap_or_else(DateHeader::today),
        }
    }
}

/// Newer of the creation and modification times, where available.
fn newest_file_time(path: &Path) -> Option<SystemTime> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta.modified().ok();
    let created = meta.created().ok();
    match (created, modified) {
        (Some(c), Some(m)) => Some(c.max(m)),
        (c, m) => c.or(m),
    }
}

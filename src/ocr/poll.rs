use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    JobHandle, OcrService, Page, PollPolicy, PollStatus, StatusReport, UnknownStatusPolicy,
};
use crate::error::{OcrError, UpstreamFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Wait,
    Complete(Vec<Page>),
}

/// A submitted job as seen by one orchestration.
#[derive(Debug)]
pub struct OcrJob {
    handle: JobHandle,
    status: JobStatus,
    attempts: u32,
}

impl OcrJob {
    pub fn new(handle: JobHandle) -> Self {
        Self {
            handle,
            status: JobStatus::Pending,
            attempts: 0,
        }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Applies one status report. Terminal jobs must not be advanced again.
    pub fn advance(
        &mut self,
        report: StatusReport,
        policy: &PollPolicy,
    ) -> Result<Transition, OcrError> {
        if self.status != JobStatus::Pending {
            return Err(OcrError::UpstreamProtocol(format!(
                "job already finished as {:?}",
                self.status
            )));
        }
        self.attempts += 1;
        match report.status {
            PollStatus::Succeeded => {
                self.status = JobStatus::Succeeded;
                Ok(Transition::Complete(report.pages.unwrap_or_default()))
            }
            PollStatus::Failed => {
                self.status = JobStatus::Failed;
                Err(UpstreamFailure::JobFailed {
                    attempts: self.attempts,
                }
                .into())
            }
            PollStatus::NotStarted | PollStatus::Running => self.wait_or_time_out(policy),
            PollStatus::Unknown(raw) => match policy.unknown_status {
                UnknownStatusPolicy::Continue => {
                    warn!("unrecognized OCR job status '{}'; still polling", raw);
                    self.wait_or_time_out(policy)
                }
                UnknownStatusPolicy::Fail => {
                    self.status = JobStatus::Failed;
                    Err(OcrError::UpstreamProtocol(format!(
                        "unrecognized OCR job status '{}'",
                        raw
                    )))
                }
            },
        }
    }

    fn wait_or_time_out(&mut self, policy: &PollPolicy) -> Result<Transition, OcrError> {
        if self.attempts >= policy.max_attempts {
            self.status = JobStatus::TimedOut;
            return Err(OcrError::Timeout {
                attempts: self.attempts,
            });
        }
        Ok(Transition::Wait)
    }
}

/// Waits one interval before every status request until the job leaves `Pending`.
pub async fn poll_until_complete<S>(
    service: &S,
    job: &mut OcrJob,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<Page>, OcrError>
where
    S: OcrService + ?Sized,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OcrError::Cancelled),
            _ = sleep(policy.interval) => {}
        }
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OcrError::Cancelled),
            report = service.poll(job.handle()) => report?,
        };
        match job.advance(report, policy)? {
            Transition::Wait => {
                debug!(
                    "OCR job pending (attempt {}/{})",
                    job.attempts(),
                    policy.max_attempts
                );
            }
            Transition::Complete(pages) => {
                debug!(
                    "OCR job succeeded after {} attempt(s), {} page(s)",
                    job.attempts(),
                    pages.len()
                );
                return Ok(pages);
            }
        }
    }
}

//! Job and submission state machines.
//!
//! Jobs reach `completed` along two independent paths: direct acceptance of a
//! submission (`open -> in_progress`, later completed by release) and escrow
//! release straight from `open`. Both are listed in [`next_job_status`] so
//! their interaction is explicit.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{
    job::{EscrowStatus, Job, JobChanges, JobStatus},
    submission::{Submission, SubmissionStatus},
};
use crate::services::authorization::{Decision, Denial};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTrigger {
    /// A client accepts a submission without going through escrow release.
    LegacyAcceptance,
    EscrowRelease,
    Cancellation,
}

pub fn next_job_status(current: JobStatus, trigger: JobTrigger) -> Decision<JobStatus> {
    use JobStatus::*;
    match (current, trigger) {
        (Open, JobTrigger::LegacyAcceptance) => Ok(InProgress),
        (Open | InProgress, JobTrigger::EscrowRelease) => Ok(Completed),
        (Open, JobTrigger::Cancellation) => Ok(Cancelled),
        (_, JobTrigger::LegacyAcceptance) => Err(Denial::invalid_state(
            "Job is no longer open for acceptance",
        )),
        (_, JobTrigger::EscrowRelease) => {
            Err(Denial::invalid_state("Job cannot be completed from its current status"))
        }
        (_, JobTrigger::Cancellation) => {
            Err(Denial::invalid_state("Job can only be cancelled while it is open"))
        }
    }
}

pub fn submission_transition_allowed(from: SubmissionStatus, to: SubmissionStatus) -> bool {
    use SubmissionStatus::*;
    matches!(
        (from, to),
        (Pending, Approved)
            | (Pending, Rejected)
            | (Pending, RevisionRequested)
            | (Pending, Accepted)
            | (Approved, Accepted)
            | (RevisionRequested, Pending)
            | (RevisionRequested, Rejected)
    )
}

pub fn check_submission_transition(from: SubmissionStatus, to: SubmissionStatus) -> Decision {
    if from == to {
        return Err(Denial::invalid_state("Submission already has this status"));
    }
    if submission_transition_allowed(from, to) {
        Ok(())
    } else {
        Err(Denial::invalid_state(
            "Submission status change is not allowed from its current status",
        ))
    }
}

/// The submission a release pays out on must belong to the job, must not be
/// rejected, and once a job has moved to `in_progress` it must be the one
/// that was accepted.
pub fn releasable_submission(job: &Job, submission: &Submission) -> Decision {
    if submission.job_id != job.id {
        return Err(Denial::not_found("Submission not found for this job"));
    }
    match submission.status {
        SubmissionStatus::Rejected => Err(Denial::invalid_state(
            "A rejected submission cannot be paid out",
        )),
        SubmissionStatus::Accepted => Ok(()),
        _ if job.status == JobStatus::InProgress => Err(Denial::invalid_state(
            "Another submission was already accepted for this job",
        )),
        _ => Ok(()),
    }
}

pub fn check_job_editable(job: &Job, changes: &JobChanges) -> Decision {
    let budget_changes = changes.budget.is_some_and(|budget| budget != job.budget);
    if budget_changes && job.escrow_status.has_committed_funds() {
        return Err(Denial::invalid_state(
            "Budget cannot change once escrow is funded",
        ));
    }
    Ok(())
}

pub fn check_job_removable(job: &Job) -> Decision {
    if job.escrow_status.has_committed_funds() {
        return Err(Denial::invalid_state(
            "Job has funds in escrow and cannot be removed",
        ));
    }
    Ok(())
}

pub fn check_fundable(job: &Job) -> Decision {
    if job.status != JobStatus::Open {
        return Err(Denial::invalid_state("Only open jobs can be funded"));
    }
    if job.escrow_status != EscrowStatus::Unfunded {
        return Err(Denial::invalid_state("Escrow has already been funded for this job"));
    }
    Ok(())
}

/// Direct acceptance is allowed on a job whose escrow was never funded.
/// Returns true when that happens so callers can report it.
pub fn legacy_acceptance_gap(job: &Job) -> bool {
    job.escrow_status != EscrowStatus::Funded
}

/// Arithmetic mean of every rating, rounded half-up to two places.
pub fn mean_rating(ratings: &[i16]) -> Option<Decimal> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let mean = Decimal::from(sum) / Decimal::from(ratings.len() as i64);
    Some(mean.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

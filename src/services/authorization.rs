//! Ownership and role rules for every state-changing operation.
//!
//! Each guard is a pure function of the acting user and the resource it
//! targets. A denial carries a [`DenialKind`] so callers can tell a missing
//! resource from a forbidden actor from an operation that is illegal in the
//! resource's current state.

use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    job::{EscrowStatus, Job, JobStatus},
    submission::{Submission, SubmissionStatus},
    transaction::Transaction,
    user::Role,
};

/// The authenticated user a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, job: &Job) -> bool {
        job.client_id == self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    NotFound,
    Forbidden,
    InvalidState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    pub kind: DenialKind,
    pub message: &'static str,
}

impl Denial {
    pub const fn not_found(message: &'static str) -> Self {
        Self { kind: DenialKind::NotFound, message }
    }

    pub const fn forbidden(message: &'static str) -> Self {
        Self { kind: DenialKind::Forbidden, message }
    }

    pub const fn invalid_state(message: &'static str) -> Self {
        Self { kind: DenialKind::InvalidState, message }
    }
}

impl From<Denial> for Error {
    fn from(denial: Denial) -> Self {
        let message = denial.message.to_string();
        match denial.kind {
            DenialKind::NotFound => Error::NotFound(message),
            DenialKind::Forbidden => Error::Forbidden(message),
            DenialKind::InvalidState => Error::InvalidState(message),
        }
    }
}

pub type Decision<T = ()> = std::result::Result<T, Denial>;

pub fn located<T>(resource: Option<T>, message: &'static str) -> Decision<T> {
    resource.ok_or(Denial::not_found(message))
}

fn allow_if(condition: bool, denial: Denial) -> Decision {
    if condition {
        Ok(())
    } else {
        Err(denial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Update,
    Delete,
    Cancel,
}

/// Which submissions of a job an actor may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionScope {
    All,
    OnlyFreelancer(Uuid),
}

impl SubmissionScope {
    pub fn freelancer(&self) -> Option<Uuid> {
        match self {
            SubmissionScope::All => None,
            SubmissionScope::OnlyFreelancer(id) => Some(*id),
        }
    }
}

pub fn can_create_job(actor: &Actor) -> Decision {
    allow_if(
        actor.role == Role::Client,
        Denial::forbidden("Only clients can post jobs"),
    )
}

pub fn can_mutate_job(actor: &Actor, job: &Job, action: JobAction) -> Decision {
    allow_if(
        actor.owns(job) || actor.is_admin(),
        Denial::forbidden("Not authorized to modify this job"),
    )?;
    let message = match action {
        JobAction::Update => "Job can only be edited while it is open",
        JobAction::Delete => "Job can only be deleted while it is open",
        JobAction::Cancel => "Job can only be cancelled while it is open",
    };
    allow_if(job.status == JobStatus::Open, Denial::invalid_state(message))
}

pub fn can_create_submission(actor: &Actor, job: &Job, already_submitted: bool) -> Decision {
    allow_if(
        actor.role == Role::Freelancer,
        Denial::forbidden("Only freelancers can submit work"),
    )?;
    allow_if(
        job.status == JobStatus::Open,
        Denial::invalid_state("Job is no longer accepting submissions"),
    )?;
    allow_if(
        job.escrow_status == EscrowStatus::Funded,
        Denial::invalid_state("Job escrow must be funded before work can be submitted"),
    )?;
    allow_if(
        !already_submitted,
        Denial::invalid_state("You have already submitted work for this job"),
    )
}

pub fn can_view_submissions(actor: &Actor, job: &Job) -> Decision<SubmissionScope> {
    if actor.owns(job) || actor.is_admin() {
        return Ok(SubmissionScope::All);
    }
    if actor.role == Role::Freelancer {
        return Ok(SubmissionScope::OnlyFreelancer(actor.id));
    }
    Err(Denial::forbidden("Not authorized to view submissions for this job"))
}

/// `job` is the job the submission belongs to.
pub fn can_mutate_submission_status(actor: &Actor, job: &Job) -> Decision {
    allow_if(
        actor.owns(job) || actor.is_admin(),
        Denial::forbidden("Not authorized to update this submission"),
    )
}

pub fn can_delete_submission(actor: &Actor, submission: &Submission) -> Decision {
    if actor.is_admin() {
        return Ok(());
    }
    allow_if(
        submission.freelancer_id == actor.id,
        Denial::forbidden("Not authorized to delete this submission"),
    )?;
    allow_if(
        submission.status == SubmissionStatus::Pending,
        Denial::invalid_state("Only pending submissions can be deleted"),
    )
}

pub fn can_rate_submission(actor: &Actor, job: &Job, submission: &Submission) -> Decision {
    allow_if(
        actor.owns(job),
        Denial::forbidden("Only the job owner can rate this submission"),
    )?;
    allow_if(
        submission.status == SubmissionStatus::Accepted,
        Denial::invalid_state("Only accepted submissions can be rated"),
    )?;
    allow_if(
        submission.rating.is_none(),
        Denial::invalid_state("Submission has already been rated"),
    )
}

/// `has_submission` is whether the actor has a submission on `job`.
pub fn can_access_message(actor: &Actor, job: &Job, has_submission: bool) -> Decision {
    let participant = actor.owns(job) || (actor.role == Role::Freelancer && has_submission);
    allow_if(
        participant || actor.is_admin(),
        Denial::forbidden("Not authorized to access messages for this job"),
    )
}

/// Admins may read any conversation but only participants write to one.
pub fn can_send_message(actor: &Actor, job: &Job, has_submission: bool) -> Decision {
    can_access_message(actor, job, has_submission)?;
    let participant = actor.owns(job) || has_submission;
    allow_if(
        participant,
        Denial::forbidden("Only job participants can send messages"),
    )
}

pub fn can_fund_escrow(actor: &Actor, job: &Job) -> Decision {
    allow_if(
        actor.owns(job),
        Denial::forbidden("Only the job owner can fund escrow"),
    )?;
    allow_if(
        job.escrow_status != EscrowStatus::Funded,
        Denial::invalid_state("Escrow is already funded"),
    )
}

pub fn can_release_escrow(actor: &Actor, job: &Job) -> Decision {
    allow_if(
        actor.owns(job),
        Denial::forbidden("Only the job owner can release escrow"),
    )?;
    match job.escrow_status {
        EscrowStatus::Funded => Ok(()),
        EscrowStatus::Released => Err(Denial::invalid_state("Escrow has already been released")),
        _ => Err(Denial::invalid_state("Escrow is not funded")),
    }
}

pub fn self_delete_guard(actor: &Actor, target_user_id: Uuid) -> Decision {
    allow_if(
        actor.id != target_user_id,
        Denial::invalid_state("You cannot perform this action on your own account"),
    )
}

pub fn can_administer(actor: &Actor) -> Decision {
    allow_if(actor.is_admin(), Denial::forbidden("Admin access required"))
}

/// `job_owner` is the client of the job the transaction belongs to.
pub fn can_view_transaction(actor: &Actor, tx: &Transaction, job_owner: Uuid) -> Decision {
    let party = tx.sender_id == actor.id
        || tx.receiver_id == Some(actor.id)
        || job_owner == actor.id;
    allow_if(
        party || actor.is_admin(),
        Denial::forbidden("Not authorized to view this transaction"),
    )
}

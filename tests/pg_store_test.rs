//! Runs the Postgres store against a live database. Skipped unless
//! `DATABASE_URL` points at a scratch database the migrations may touch.

use std::env;

use marketplace_backend::database::{
    pool::{create_pool, run_migrations},
    store::{DepositOutcome, DepositSettlement, EscrowRelease, SettlementOutcome, SubmissionRating},
    MarketplaceStore, PgStore,
};
use marketplace_backend::models::{
    job::{Currency, EscrowStatus, Job, JobStatus, NewJob, PaymentProvider},
    submission::{NewSubmission, Submission, SubmissionStatus},
    transaction::{NewTransaction, Transaction, TransactionFees, TransactionKind, TransactionStatus},
    user::{NewUser, Role, User},
};
use rust_decimal::Decimal;
use uuid::Uuid;

async fn setup_store() -> Option<PgStore> {
    dotenvy::dotenv().ok();
    let Ok(url) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres store test");
        return None;
    };
    let pool = create_pool(&url).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    Some(PgStore::new(pool))
}

async fn user(store: &PgStore, role: Role) -> User {
    store
        .insert_user(NewUser {
            email: format!("{}@pg-store.test", Uuid::new_v4()),
            password_hash: "x".into(),
            full_name: "Store Test".into(),
            role,
            phone: None,
            location: None,
        })
        .await
        .expect("insert user")
}

async fn seed(store: &PgStore) -> (User, User, Job) {
    let client = user(store, Role::Client).await;
    let freelancer = user(store, Role::Freelancer).await;
    let job = store
        .insert_job(NewJob {
            client_id: client.id,
            title: "Build a landing page".into(),
            description: "A simple landing page with a contact form".into(),
            category: "web".into(),
            budget: Decimal::new(1000, 0),
            currency: Currency::Tnd,
            payment_provider: PaymentProvider::Konnect,
            deadline: None,
            required_skills: vec![],
            location: None,
            location_required: false,
        })
        .await
        .expect("insert job");
    (client, freelancer, job)
}

async fn pending_deposit(store: &PgStore, job: &Job) -> Transaction {
    store
        .insert_transaction(NewTransaction {
            job_id: job.id,
            sender_id: job.client_id,
            receiver_id: None,
            amount: Decimal::new(1020, 0),
            currency: job.currency,
            kind: TransactionKind::EscrowDeposit,
            status: TransactionStatus::Pending,
            provider: PaymentProvider::Konnect,
            fees: TransactionFees {
                platform_fee: Decimal::ZERO,
                processor_fee: Decimal::new(20, 0),
            },
            metadata: serde_json::json!({ "original_budget": "1000" }),
        })
        .await
        .expect("insert deposit")
}

fn success(id: Uuid) -> DepositSettlement {
    DepositSettlement {
        transaction_id: id,
        outcome: SettlementOutcome::Success {
            provider_reference: format!("konnect_{}", id.simple()),
        },
    }
}

async fn funded_with_submission(store: &PgStore) -> (User, User, Job, Submission) {
    let (client, freelancer, job) = seed(store).await;
    let deposit = pending_deposit(store, &job).await;
    let outcome = store.settle_deposit(success(deposit.id)).await.expect("settle");
    assert!(matches!(outcome, DepositOutcome::Funded { .. }));
    let submission = store
        .insert_submission(NewSubmission {
            job_id: job.id,
            freelancer_id: freelancer.id,
            description: "Delivered the landing page as requested".into(),
            attachments: vec![],
        })
        .await
        .expect("insert submission");
    (client, freelancer, job, submission)
}

fn release(client: &User, freelancer: &User, job: &Job, submission: &Submission) -> EscrowRelease {
    EscrowRelease {
        job_id: job.id,
        client_id: client.id,
        expected_job_status: JobStatus::Open,
        submission_id: submission.id,
        expected_submission_status: SubmissionStatus::Pending,
        freelancer_id: freelancer.id,
        amount: job.budget,
        currency: job.currency,
    }
}

#[tokio::test]
async fn deposit_funds_once_and_replays_as_settled() {
    let Some(store) = setup_store().await else {
        return;
    };
    let (_, _, job) = seed(&store).await;
    let deposit = pending_deposit(&store, &job).await;

    match store.settle_deposit(success(deposit.id)).await.unwrap() {
        DepositOutcome::Funded { transaction, job } => {
            assert_eq!(transaction.status, TransactionStatus::Completed);
            assert!(transaction.provider_transaction_id.is_some());
            assert_eq!(job.escrow_status, EscrowStatus::Funded);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    match store.settle_deposit(success(deposit.id)).await.unwrap() {
        DepositOutcome::AlreadySettled(tx) => assert_eq!(tx.status, TransactionStatus::Completed),
        other => panic!("unexpected outcome {:?}", other),
    }

    let outcome = store.settle_deposit(success(Uuid::new_v4())).await.unwrap();
    assert!(matches!(outcome, DepositOutcome::Missing));
}

#[tokio::test]
async fn second_deposit_hits_the_completed_deposit_index() {
    let Some(store) = setup_store().await else {
        return;
    };
    let (_, _, job) = seed(&store).await;
    let first = pending_deposit(&store, &job).await;
    let second = pending_deposit(&store, &job).await;

    let outcome = store.settle_deposit(success(first.id)).await.unwrap();
    assert!(matches!(outcome, DepositOutcome::Funded { .. }));

    match store.settle_deposit(success(second.id)).await.unwrap() {
        DepositOutcome::JobConflict(tx) => {
            assert_eq!(tx.id, second.id);
            assert_eq!(tx.status, TransactionStatus::Failed);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let job = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.escrow_status, EscrowStatus::Funded);
}

#[tokio::test]
async fn concurrent_releases_pay_out_once() {
    let Some(store) = setup_store().await else {
        return;
    };
    let (client, freelancer, job, submission) = funded_with_submission(&store).await;
    let request = release(&client, &freelancer, &job, &submission);

    let (first, second) = tokio::join!(
        store.release_escrow(request.clone()),
        store.release_escrow(request),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(first.is_some() != second.is_some());

    let record = first.or(second).unwrap();
    assert_eq!(record.transaction.kind, TransactionKind::EscrowRelease);
    assert_eq!(record.transaction.amount, job.budget);
    assert_eq!(record.job.escrow_status, EscrowStatus::Released);
    assert_eq!(record.job.status, JobStatus::Completed);
    assert_eq!(record.submission.status, SubmissionStatus::Accepted);

    let freelancer = store.find_user(freelancer.id).await.unwrap().unwrap();
    assert_eq!(freelancer.total_earned, job.budget);
    assert_eq!(freelancer.total_jobs_completed, 1);
}

#[tokio::test]
async fn release_rolls_back_when_submission_moved_on() {
    let Some(store) = setup_store().await else {
        return;
    };
    let (client, freelancer, job, submission) = funded_with_submission(&store).await;
    store
        .update_submission_status_if(
            submission.id,
            SubmissionStatus::Pending,
            SubmissionStatus::Rejected,
            None,
        )
        .await
        .unwrap()
        .expect("submission rejected");

    let record = store
        .release_escrow(release(&client, &freelancer, &job, &submission))
        .await
        .unwrap();
    assert!(record.is_none());

    let job = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.escrow_status, EscrowStatus::Funded);
    assert_eq!(job.status, JobStatus::Open);
    let freelancer = store.find_user(freelancer.id).await.unwrap().unwrap();
    assert_eq!(freelancer.total_earned, Decimal::ZERO);
}

#[tokio::test]
async fn rating_updates_the_freelancer_average_atomically() {
    let Some(store) = setup_store().await else {
        return;
    };
    let (client, freelancer, job, submission) = funded_with_submission(&store).await;
    store
        .release_escrow(release(&client, &freelancer, &job, &submission))
        .await
        .unwrap()
        .expect("released");

    let rate = |rating: i16| SubmissionRating {
        submission_id: submission.id,
        rating,
        review: None,
    };
    let (first, second) = tokio::join!(store.rate_submission(rate(5)), store.rate_submission(rate(2)));
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(first.is_some() != second.is_some());

    let rated = first.or(second).unwrap();
    let stored = store.find_user(freelancer.id).await.unwrap().unwrap();
    assert_eq!(stored.rating, rated.freelancer_rating);
    assert_eq!(
        rated.freelancer_rating,
        Decimal::from(rated.submission.rating.unwrap())
    );
}

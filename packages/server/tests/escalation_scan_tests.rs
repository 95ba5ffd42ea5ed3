//! Escalation scan integration tests.
//!
//! Covers the grace window, the LINKED-profile filter, claim-before-notify
//! semantics (a second run never re-processes), notification failure
//! isolation, and the batch limit.

mod common;

use chrono::Duration;
use uuid::Uuid;

use common::{caregiver_with_profile, seed_medication, Fixture};
use server_core::domains::escalation::actions::{scan, ScanParams};
use server_core::domains::escalation::models::DoseStatus;
use server_core::kernel::{BaseClock, BaseStore, NotificationKind};

fn params() -> ScanParams {
    ScanParams {
        grace: Duration::minutes(60),
        batch_limit: 100,
    }
}

/// A linked profile (patient paired) with one consenting caregiver.
async fn linked_fixture() -> (Fixture, Uuid) {
    let fixture = caregiver_with_profile();
    let patient_id = Uuid::new_v4();
    let linked = fixture
        .td
        .store
        .link_profile(fixture.profile_id, patient_id)
        .await
        .unwrap();
    assert!(linked);
    (fixture, patient_id)
}

#[tokio::test]
async fn scan_marks_overdue_dose_missed_and_notifies() {
    let (fixture, _patient) = linked_fixture().await;
    let deps = fixture.td.deps();
    let medication_id = seed_medication(&fixture, "Metformin");

    let now = fixture.td.clock.now();
    let instance_id =
        fixture
            .td
            .store
            .add_dose(fixture.profile_id, medication_id, now - Duration::minutes(90));

    let outcome = scan(params(), &deps).await.unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.notified, 1);
    assert_eq!(
        fixture.td.store.dose_status(instance_id),
        Some(DoseStatus::Missed)
    );

    let sent = fixture.td.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, fixture.caregiver_id);
    assert_eq!(sent[0].1.kind, NotificationKind::DoseMissed);
    assert!(sent[0].1.body.contains("Metformin"));

    assert!(fixture.td.audit_log.actions().contains(&"ESCALATION_SENT"));
}

#[tokio::test]
async fn scan_leaves_doses_inside_the_grace_window() {
    let (fixture, _patient) = linked_fixture().await;
    let deps = fixture.td.deps();
    let medication_id = seed_medication(&fixture, "Metformin");

    let now = fixture.td.clock.now();
    let instance_id =
        fixture
            .td
            .store
            .add_dose(fixture.profile_id, medication_id, now - Duration::minutes(30));

    let outcome = scan(params(), &deps).await.unwrap();

    assert_eq!(outcome.processed, 0);
    assert_eq!(
        fixture.td.store.dose_status(instance_id),
        Some(DoseStatus::Due)
    );
    assert!(fixture.td.dispatcher.sent().is_empty());
    // No audit entry for an empty run.
    assert!(fixture.td.audit_log.entries().is_empty());
}

#[tokio::test]
async fn scan_skips_unlinked_profiles() {
    // MANAGED profile: the caregiver does their own confirmations, so
    // escalation would be noise.
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();
    let medication_id = seed_medication(&fixture, "Metformin");

    let now = fixture.td.clock.now();
    let instance_id =
        fixture
            .td
            .store
            .add_dose(fixture.profile_id, medication_id, now - Duration::minutes(90));

    let outcome = scan(params(), &deps).await.unwrap();

    assert_eq!(outcome.processed, 0);
    assert_eq!(
        fixture.td.store.dose_status(instance_id),
        Some(DoseStatus::Due)
    );
}

#[tokio::test]
async fn second_scan_does_not_reprocess_claimed_instances() {
    let (fixture, _patient) = linked_fixture().await;
    let deps = fixture.td.deps();
    let medication_id = seed_medication(&fixture, "Metformin");

    let now = fixture.td.clock.now();
    fixture
        .td
        .store
        .add_dose(fixture.profile_id, medication_id, now - Duration::minutes(90));

    let first = scan(params(), &deps).await.unwrap();
    let second = scan(params(), &deps).await.unwrap();

    assert_eq!(first.processed, 1);
    assert_eq!(second.processed, 0);
    assert_eq!(fixture.td.dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn confirmed_doses_are_not_escalated() {
    let (fixture, _patient) = linked_fixture().await;
    let deps = fixture.td.deps();
    let medication_id = seed_medication(&fixture, "Metformin");

    let now = fixture.td.clock.now();
    let instance_id =
        fixture
            .td
            .store
            .add_dose(fixture.profile_id, medication_id, now - Duration::minutes(90));
    fixture.td.store.set_dose_status(instance_id, DoseStatus::Taken);

    let outcome = scan(params(), &deps).await.unwrap();

    assert_eq!(outcome.processed, 0);
    assert_eq!(
        fixture.td.store.dose_status(instance_id),
        Some(DoseStatus::Taken)
    );
}

#[tokio::test]
async fn notification_failure_does_not_stall_the_batch() {
    let (fixture, _patient) = linked_fixture().await;
    let deps = fixture.td.deps();
    let medication_id = seed_medication(&fixture, "Metformin");

    let now = fixture.td.clock.now();
    let first =
        fixture
            .td
            .store
            .add_dose(fixture.profile_id, medication_id, now - Duration::minutes(120));
    let second =
        fixture
            .td
            .store
            .add_dose(fixture.profile_id, medication_id, now - Duration::minutes(90));

    fixture.td.dispatcher.fail_next();

    let outcome = scan(params(), &deps).await.unwrap();

    // Both instances are claimed and MISSED even though the first dispatch
    // failed.
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.notified, 1);
    assert_eq!(fixture.td.store.dose_status(first), Some(DoseStatus::Missed));
    assert_eq!(fixture.td.store.dose_status(second), Some(DoseStatus::Missed));
    assert_eq!(fixture.td.dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn batch_limit_bounds_a_run_and_the_backlog_drains() {
    let (fixture, _patient) = linked_fixture().await;
    let deps = fixture.td.deps();
    let medication_id = seed_medication(&fixture, "Metformin");

    let now = fixture.td.clock.now();
    for offset in [180, 150, 120] {
        fixture.td.store.add_dose(
            fixture.profile_id,
            medication_id,
            now - Duration::minutes(offset),
        );
    }

    let bounded = ScanParams {
        grace: Duration::minutes(60),
        batch_limit: 2,
    };

    let first = scan(bounded, &deps).await.unwrap();
    let second = scan(bounded, &deps).await.unwrap();

    assert_eq!(first.processed, 2);
    assert_eq!(second.processed, 1);
}

#[tokio::test]
async fn missed_without_consenting_caregivers_is_still_recorded() {
    let fixture = caregiver_with_profile();
    let patient_id = Uuid::new_v4();
    assert!(fixture
        .td
        .store
        .link_profile(fixture.profile_id, patient_id)
        .await
        .unwrap());

    // Withdraw the caregiver's notification consent.
    let deps = fixture.td.deps();
    deps.store
        .update_member_grants(
            fixture.profile_id,
            fixture.caregiver_id,
            &server_core::domains::pairing::models::CapabilityGrants {
                can_add_edit_meds: true,
                can_view_log: true,
                notify_if_no_confirmation: false,
            },
        )
        .await
        .unwrap();

    let medication_id = seed_medication(&fixture, "Metformin");
    let now = fixture.td.clock.now();
    let instance_id =
        fixture
            .td
            .store
            .add_dose(fixture.profile_id, medication_id, now - Duration::minutes(90));

    let outcome = scan(params(), &deps).await.unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.notified, 0);
    assert_eq!(
        fixture.td.store.dose_status(instance_id),
        Some(DoseStatus::Missed)
    );
    assert!(fixture.td.dispatcher.sent().is_empty());
}

//! Pairing invite lifecycle integration tests.
//!
//! Covers the full PENDING → ACCEPTED / EXPIRED / REVOKED lifecycle, the
//! single-pending-invite invariant, and the link rollback when membership
//! insertion fails mid-acceptance.

mod common;

use chrono::Duration;
use uuid::Uuid;

use common::{caregiver_with_profile, start_time};
use server_core::common::CoreError;
use server_core::domains::pairing::actions::{
    accept_invite, create_invite, AcceptInviteRequest, ConsentGrants, CreateInviteRequest,
};
use server_core::domains::pairing::models::{InviteStatus, MemberRole, ProfileType};
use server_core::kernel::test_dependencies::MockTokenSource;
use server_core::kernel::{BaseStore, NotificationKind};

fn invite_request(profile_id: Uuid) -> CreateInviteRequest {
    CreateInviteRequest {
        profile_id,
        patient_phone_e164: "+966501234567".to_string(),
    }
}

fn consent() -> ConsentGrants {
    ConsentGrants {
        caregiver_can_add_edit_meds: true,
        caregiver_can_view_log: true,
        caregiver_notify_if_no_confirmation: true,
    }
}

#[tokio::test]
async fn create_invite_returns_code_and_links() {
    let common::Fixture {
        td,
        caregiver_id,
        profile_id,
    } = caregiver_with_profile();
    let td = td.with_tokens(MockTokenSource::new().with_pair_code("482913"));
    let deps = td.deps();

    let response = create_invite(invite_request(profile_id), caregiver_id, None, &deps)
        .await
        .unwrap();

    assert_eq!(response.pair_code, "482913");
    assert_eq!(
        response.link_url,
        "https://carelink.test/pair?code=482913"
    );
    assert!(response.whatsapp_link.starts_with("https://wa.me/966501234567?text="));
    assert_eq!(response.expires_at, start_time() + Duration::hours(72));

    let invites = td.store.invites();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].status, InviteStatus::Pending);
    assert!(td.audit_log.actions().contains(&"PAIR_INVITE_CREATED"));
}

#[tokio::test]
async fn create_invite_rejects_invalid_phone() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let result = create_invite(
        CreateInviteRequest {
            profile_id: fixture.profile_id,
            patient_phone_e164: "0501234567".to_string(),
        },
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    assert!(fixture.td.store.invites().is_empty());
}

#[tokio::test]
async fn create_invite_supersedes_prior_pending() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await
    .unwrap();
    create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await
    .unwrap();

    let invites = fixture.td.store.invites();
    assert_eq!(invites.len(), 2);
    assert_eq!(invites[0].status, InviteStatus::Revoked);
    assert_eq!(invites[1].status, InviteStatus::Pending);

    let pending: Vec<_> = invites
        .iter()
        .filter(|i| i.status == InviteStatus::Pending)
        .collect();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn create_invite_is_rate_limited_per_profile() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    fixture.td.rate_limiter.deny();

    let result = create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::RateLimited)));
    assert_eq!(
        fixture.td.rate_limiter.keys(),
        vec![format!("pairing:{}", fixture.profile_id)]
    );
}

#[tokio::test]
async fn create_invite_rejects_linked_profile() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let patient_id = Uuid::new_v4();
    assert!(deps
        .store
        .link_profile(fixture.profile_id, patient_id)
        .await
        .unwrap());

    let result = create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::ProfileAlreadyLinked)));
}

#[tokio::test]
async fn create_invite_requires_edit_permission() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let stranger = Uuid::new_v4();
    let result = create_invite(invite_request(fixture.profile_id), stranger, None, &deps).await;

    assert!(matches!(result, Err(CoreError::Forbidden)));
}

#[tokio::test]
async fn accept_invite_links_profile_and_applies_consent() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let response = create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await
    .unwrap();

    let patient_id = Uuid::new_v4();
    let accepted = accept_invite(
        AcceptInviteRequest {
            pair_code: response.pair_code,
            consent: consent(),
        },
        patient_id,
        None,
        &deps,
    )
    .await
    .unwrap();

    assert_eq!(accepted.profile_id, fixture.profile_id);
    assert_eq!(accepted.profile_name, "Mama Noura");

    let profile = fixture.td.store.profile(fixture.profile_id).unwrap();
    assert_eq!(profile.linked_user_id, Some(patient_id));
    assert_eq!(profile.profile_type, ProfileType::Linked);

    let members = fixture.td.store.members();
    let patient = members
        .iter()
        .find(|m| m.member_user_id == patient_id)
        .unwrap();
    assert_eq!(patient.role, MemberRole::OwnerPatient);
    assert!(patient.can_add_edit_meds);
    assert!(patient.can_view_log);
    assert!(!patient.notify_if_no_confirmation);

    let caregiver = members
        .iter()
        .find(|m| m.member_user_id == fixture.caregiver_id)
        .unwrap();
    assert!(caregiver.can_add_edit_meds);
    assert!(caregiver.notify_if_no_confirmation);

    assert_eq!(fixture.td.store.invites()[0].status, InviteStatus::Accepted);

    let sent = fixture.td.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, fixture.caregiver_id);
    assert_eq!(sent[0].1.kind, NotificationKind::InviteAccepted);

    assert!(fixture
        .td
        .audit_log
        .actions()
        .contains(&"PAIR_INVITE_ACCEPTED"));
}

#[tokio::test]
async fn accept_after_expiry_marks_invite_expired() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let response = create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await
    .unwrap();

    fixture.td.clock.advance(Duration::hours(73));

    let patient_id = Uuid::new_v4();
    let result = accept_invite(
        AcceptInviteRequest {
            pair_code: response.pair_code,
            consent: consent(),
        },
        patient_id,
        None,
        &deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::InviteExpired)));
    // EXPIRED is terminal and was written lazily; the invite never reaches
    // ACCEPTED and the profile stays unlinked.
    assert_eq!(fixture.td.store.invites()[0].status, InviteStatus::Expired);
    let profile = fixture.td.store.profile(fixture.profile_id).unwrap();
    assert_eq!(profile.linked_user_id, None);
}

#[tokio::test]
async fn accept_rejects_caregiver_accepting_own_invite() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let response = create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await
    .unwrap();

    let result = accept_invite(
        AcceptInviteRequest {
            pair_code: response.pair_code,
            consent: consent(),
        },
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::PatientIsCaregiver)));
}

#[tokio::test]
async fn accept_rejects_non_pending_invite() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let first = create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await
    .unwrap();
    // Superseded by a second invite.
    create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await
    .unwrap();

    let result = accept_invite(
        AcceptInviteRequest {
            pair_code: first.pair_code,
            consent: consent(),
        },
        Uuid::new_v4(),
        None,
        &deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::InviteNotPending)));
}

#[tokio::test]
async fn accept_rejects_unknown_or_malformed_code() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let result = accept_invite(
        AcceptInviteRequest {
            pair_code: "000000".to_string(),
            consent: consent(),
        },
        Uuid::new_v4(),
        None,
        &deps,
    )
    .await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));

    let result = accept_invite(
        AcceptInviteRequest {
            pair_code: "48291".to_string(),
            consent: consent(),
        },
        Uuid::new_v4(),
        None,
        &deps,
    )
    .await;
    assert!(matches!(result, Err(CoreError::InvalidInput(_))));
}

#[tokio::test]
async fn membership_failure_rolls_back_profile_link() {
    let fixture = caregiver_with_profile();
    let deps = fixture.td.deps();

    let response = create_invite(
        invite_request(fixture.profile_id),
        fixture.caregiver_id,
        None,
        &deps,
    )
    .await
    .unwrap();

    fixture.td.store.fail_next_insert_member();

    let patient_id = Uuid::new_v4();
    let result = accept_invite(
        AcceptInviteRequest {
            pair_code: response.pair_code,
            consent: consent(),
        },
        patient_id,
        None,
        &deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::Storage(_))));

    // The link was compensated: the profile is unlinked and the invite still
    // PENDING, so the patient can retry with the same code.
    let profile = fixture.td.store.profile(fixture.profile_id).unwrap();
    assert_eq!(profile.linked_user_id, None);
    assert_eq!(profile.profile_type, ProfileType::Managed);
    assert_eq!(fixture.td.store.invites()[0].status, InviteStatus::Pending);
    assert!(fixture.td.dispatcher.sent().is_empty());
}

//! Shared fixtures for integration tests.
//!
//! All suites run against the in-memory store with a controllable clock, so
//! every time-dependent path (invite expiry, session expiry, the escalation
//! grace period) is exercised deterministically.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use server_core::domains::pairing::models::{MemberRole, Profile, ProfileMember, ProfileType};
use server_core::domains::sharing::models::{MedSchedule, Medication};
use server_core::kernel::test_dependencies::TestDependencies;

/// Fixed start instant so assertions about expiry arithmetic are exact.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub struct Fixture {
    pub td: TestDependencies,
    pub caregiver_id: Uuid,
    pub profile_id: Uuid,
}

/// A caregiver who owns one MANAGED profile and is a consenting caregiver
/// member of it.
pub fn caregiver_with_profile() -> Fixture {
    let td = TestDependencies::new();
    td.clock.set(start_time());

    let caregiver_id = Uuid::new_v4();
    let profile_id = Uuid::new_v4();

    td.store.add_profile(Profile {
        id: profile_id,
        owner_user_id: caregiver_id,
        display_name: "Mama Noura".to_string(),
        profile_type: ProfileType::Managed,
        linked_user_id: None,
        language_pref: "ar".to_string(),
        timezone: "Asia/Riyadh".to_string(),
        created_at: start_time(),
    });
    td.store.add_member(ProfileMember {
        profile_id,
        member_user_id: caregiver_id,
        role: MemberRole::Caregiver,
        can_add_edit_meds: true,
        can_view_log: true,
        notify_if_no_confirmation: true,
    });

    Fixture {
        td,
        caregiver_id,
        profile_id,
    }
}

/// Seed one active medication with photos and a daily schedule; returns its id.
pub fn seed_medication(fixture: &Fixture, name: &str) -> Uuid {
    let medication_id = Uuid::new_v4();
    fixture.td.store.add_medication(Medication {
        id: medication_id,
        profile_id: fixture.profile_id,
        name: name.to_string(),
        instructions_text: Some("After breakfast".to_string()),
        pill_photo_path: Some(format!("meds/{medication_id}/pill.jpg")),
        box_photo_path: Some(format!("meds/{medication_id}/box.jpg")),
        visual_tags: vec!["white".to_string(), "round".to_string()],
        schedules: vec![MedSchedule {
            schedule_type: "daily".to_string(),
            times_local: vec!["08:00".to_string(), "20:00".to_string()],
            days_of_week: None,
            every_x_hours: None,
        }],
    });
    medication_id
}

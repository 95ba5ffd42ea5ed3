pub mod jwt;

pub use jwt::{Claims, JwtService};

use anyhow::Result;
use uuid::Uuid;

use crate::domains::pairing::models::MemberRole;
use crate::kernel::BaseStore;

/// Check whether a user is a member of a profile (any role).
pub async fn is_member(store: &dyn BaseStore, profile_id: Uuid, user_id: Uuid) -> Result<bool> {
    Ok(store.member(profile_id, user_id).await?.is_some())
}

/// Check whether a user owns a profile (the caregiver account that created it).
pub async fn is_owner(store: &dyn BaseStore, profile_id: Uuid, user_id: Uuid) -> Result<bool> {
    Ok(store
        .profile_by_id(profile_id)
        .await?
        .map(|p| p.owner_user_id == user_id)
        .unwrap_or(false))
}

/// Check whether a user may add or edit medications for a profile.
///
/// True for the profile owner, the linked patient (OWNER_PATIENT role), and
/// caregivers the patient has granted the edit capability to.
pub async fn can_edit_meds(store: &dyn BaseStore, profile_id: Uuid, user_id: Uuid) -> Result<bool> {
    if is_owner(store, profile_id, user_id).await? {
        return Ok(true);
    }

    match store.member(profile_id, user_id).await? {
        Some(member) => Ok(member.role == MemberRole::OwnerPatient || member.can_add_edit_meds),
        None => Ok(false),
    }
}

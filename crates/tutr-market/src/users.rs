//! Student and tutor profiles.

use tutr_core::{
  key::UserId,
  path::scheme,
  store::{RecordStore, WriteBatch},
  user::{Profile, Role, User},
};

use crate::{
  Error, Result,
  gateway::{Gateway, encode},
};

/// Registration and role resolution over the `students` and `tutors`
/// collections.
pub struct UserDirectory<S> {
  gateway: Gateway<S>,
}

impl<S> Clone for UserDirectory<S> {
  fn clone(&self) -> Self { Self { gateway: self.gateway.clone() } }
}

/// Add the profile write for `id`, guarded on neither role holding it yet.
pub(crate) fn registration(
  batch: WriteBatch,
  id: &UserId,
  role: Role,
  profile: &Profile,
) -> Result<WriteBatch> {
  profile.validate()?;
  Ok(
    batch
      .guard(scheme::profile(Role::Student, id), None)
      .guard(scheme::profile(Role::Tutor, id), None)
      .set(scheme::profile(role, id), encode(profile)?),
  )
}

impl<S: RecordStore> UserDirectory<S> {
  pub fn new(gateway: Gateway<S>) -> Self { Self { gateway } }

  /// Store a profile under `role`. The id must not be present in either
  /// collection, which keeps the two disjoint.
  pub async fn register(&self, id: UserId, role: Role, profile: Profile) -> Result<User> {
    let batch = registration(WriteBatch::new(), &id, role, &profile)?;
    match self.gateway.commit(batch).await {
      Ok(()) => {
        tracing::info!(user = %id, %role, "registered user");
        Ok(User::new(role, id, profile))
      }
      Err(err) if err.is_precondition_failed() => Err(Error::AlreadyRegistered(id)),
      Err(err) => Err(err),
    }
  }

  /// Look the id up in both collections and return the tagged user.
  pub async fn resolve(&self, id: &UserId) -> Result<User> {
    let (student, tutor) = tokio::try_join!(
      self.profile(Role::Student, id),
      self.profile(Role::Tutor, id),
    )?;
    match (student, tutor) {
      (Some(profile), None) => Ok(User::new(Role::Student, id.clone(), profile)),
      (None, Some(profile)) => Ok(User::new(Role::Tutor, id.clone(), profile)),
      (Some(_), Some(_)) => Err(Error::RoleConflict(id.clone())),
      (None, None) => Err(Error::UserNotFound(id.clone())),
    }
  }

  pub async fn tutor(&self, id: &UserId) -> Result<User> {
    let profile = self
      .profile(Role::Tutor, id)
      .await?
      .ok_or_else(|| Error::TutorNotFound(id.clone()))?;
    Ok(User::new(Role::Tutor, id.clone(), profile))
  }

  pub async fn student(&self, id: &UserId) -> Result<User> {
    let profile = self
      .profile(Role::Student, id)
      .await?
      .ok_or_else(|| Error::StudentNotFound(id.clone()))?;
    Ok(User::new(Role::Student, id.clone(), profile))
  }

  async fn profile(&self, role: Role, id: &UserId) -> Result<Option<Profile>> {
    self.gateway.read(scheme::profile(role, id)).await
  }
}

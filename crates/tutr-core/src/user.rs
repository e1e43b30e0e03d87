//! Users: students and tutors.
//!
//! A user's role is decided by which collection holds the profile record. The
//! role is resolved once and carried as the [`User`] variant from then on.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, key::UserId};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Student,
  Tutor,
}

impl Role {
  pub fn other(self) -> Self {
    match self {
      Self::Student => Self::Tutor,
      Self::Tutor => Self::Student,
    }
  }
}

/// The profile record stored at `students/{id}` or `tutors/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub name:          String,
  pub age:           u16,
  pub university:    String,
  pub study_line:    String,
  pub email:         String,
  /// URL or storage reference; absent when no picture was uploaded.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub profile_image: Option<String>,
}

impl Profile {
  /// Reject profiles with blank required fields.
  pub fn validate(&self) -> Result<()> {
    let required = [
      ("name", &self.name),
      ("university", &self.university),
      ("study line", &self.study_line),
      ("email", &self.email),
    ];
    for (field, value) in required {
      if value.trim().is_empty() {
        return Err(Error::MissingField(field));
      }
    }
    if self.age == 0 {
      return Err(Error::MissingField("age"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub id:      UserId,
  #[serde(flatten)]
  pub profile: Profile,
}

/// A resolved user: the role is the variant, not a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum User {
  Student(Account),
  Tutor(Account),
}

impl User {
  pub fn new(role: Role, id: UserId, profile: Profile) -> Self {
    let account = Account { id, profile };
    match role {
      Role::Student => Self::Student(account),
      Role::Tutor => Self::Tutor(account),
    }
  }

  pub fn role(&self) -> Role {
    match self {
      Self::Student(_) => Role::Student,
      Self::Tutor(_) => Role::Tutor,
    }
  }

  pub fn account(&self) -> &Account {
    match self {
      Self::Student(a) | Self::Tutor(a) => a,
    }
  }

  pub fn id(&self) -> &UserId { &self.account().id }

  pub fn profile(&self) -> &Profile { &self.account().profile }

  pub fn display_name(&self) -> &str { &self.profile().name }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn profile(name: &str) -> Profile {
    Profile {
      name:          name.into(),
      age:           23,
      university:    "cbs".into(),
      study_line:    "HaIt".into(),
      email:         format!("{}@example.com", name.to_lowercase()),
      profile_image: None,
    }
  }

  #[test]
  fn profile_uses_camel_case_on_the_wire() {
    let json = serde_json::to_value(profile("Ada")).unwrap();
    assert_eq!(json["studyLine"], "HaIt");
    assert!(json.get("profileImage").is_none());
  }

  #[test]
  fn user_is_tagged_by_role() {
    let user = User::new(Role::Tutor, "T1".parse().unwrap(), profile("Ada"));
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["role"], "tutor");
    assert_eq!(json["id"], "T1");
    assert_eq!(json["name"], "Ada");

    let back: User = serde_json::from_value(json).unwrap();
    assert_eq!(back.role(), Role::Tutor);
    assert_eq!(back.display_name(), "Ada");
  }

  #[test]
  fn blank_fields_fail_validation() {
    let mut p = profile("Ada");
    p.university = "  ".into();
    assert!(matches!(p.validate(), Err(Error::MissingField("university"))));
  }

  #[test]
  fn role_parses_from_lowercase() {
    assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
    assert_eq!(Role::Tutor.to_string(), "tutor");
    assert_eq!(Role::Tutor.other(), Role::Student);
  }
}

//! Principals, sessions, and the login exchange.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Minimum password length accepted by the login form.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Number of digits in an Aadhaar number.
pub const AADHAAR_DIGITS: usize = 12;

/// Which kind of actor a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
  Citizen,
  Officer,
}

impl fmt::Display for PrincipalKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Citizen => "citizen",
      Self::Officer => "officer",
    })
  }
}

/// Profile of the authenticated principal as returned by login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalProfile {
  pub name:       String,
  /// Aadhaar number for citizens; officer id or email for officers.
  #[serde(alias = "aadhaar_id", alias = "officer_id")]
  pub identifier: String,
  #[serde(default)]
  pub email:      Option<String>,
}

/// An authenticated session. The token and the principal travel together, so
/// a token can never exist without exactly one principal kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub token:   String,
  pub kind:    PrincipalKind,
  pub profile: PrincipalProfile,
}

/// The principal half of a session, persisted separately from the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPrincipal {
  pub kind:    PrincipalKind,
  pub profile: PrincipalProfile,
}

impl Session {
  pub fn principal(&self) -> StoredPrincipal {
    StoredPrincipal { kind: self.kind, profile: self.profile.clone() }
  }

  pub fn from_parts(token: String, principal: StoredPrincipal) -> Self {
    Self { token, kind: principal.kind, profile: principal.profile }
  }
}

// ─── Login ───────────────────────────────────────────────────────────────────

/// Login form input.
#[derive(Clone)]
pub struct Credentials {
  pub kind:       PrincipalKind,
  pub identifier: String,
  pub password:   String,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("kind", &self.kind)
      .field("identifier", &self.identifier)
      .finish_non_exhaustive()
  }
}

impl Credentials {
  pub fn citizen(aadhaar: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      kind:       PrincipalKind::Citizen,
      identifier: aadhaar.into(),
      password:   password.into(),
    }
  }

  pub fn officer(email: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      kind:       PrincipalKind::Officer,
      identifier: email.into(),
      password:   password.into(),
    }
  }

  /// Check the form constraints and build the wire body.
  ///
  /// Citizen identifiers may be typed in groups of four (`1234 5678 9012`);
  /// whitespace is stripped before the digit check.
  pub fn to_request(&self) -> Result<LoginRequest> {
    let identifier = match self.kind {
      PrincipalKind::Citizen => {
        let digits: String =
          self.identifier.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() != AADHAAR_DIGITS || !digits.chars().all(|c| c.is_ascii_digit())
        {
          return Err(Error::InvalidCredentials("Aadhaar number must be 12 digits"));
        }
        digits
      }
      PrincipalKind::Officer => {
        let trimmed = self.identifier.trim();
        if trimmed.is_empty() {
          return Err(Error::InvalidCredentials("officer identifier is required"));
        }
        trimmed.to_owned()
      }
    };

    if self.password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::InvalidCredentials("password must be at least 6 characters"));
    }

    Ok(LoginRequest {
      identifier,
      password: self.password.clone(),
      principal_kind: self.kind,
    })
  }
}

/// JSON body of `POST /auth/login`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
  pub identifier:     String,
  pub password:       String,
  pub principal_kind: PrincipalKind,
}

impl fmt::Debug for LoginRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoginRequest")
      .field("identifier", &self.identifier)
      .field("principal_kind", &self.principal_kind)
      .finish_non_exhaustive()
  }
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
  #[serde(alias = "access_token")]
  pub token: String,
  #[serde(alias = "profile")]
  pub user:  PrincipalProfile,
}

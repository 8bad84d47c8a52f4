use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejections raised before a request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all fields ({0} is required)")]
    MissingField(&'static str),

    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Loose structural check: one `@`, something before it, a dotted domain after it.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    #[serde(rename = "userName")]
    pub user_name: String,
    pub pass: String,
}

impl LoginCredentials {
    pub fn new(user_name: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            pass: pass.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.user_name, "userName")?;
        require(&self.pass, "pass")
    }
}

/// Body of the mentor registration call.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub birthdate: String,
    #[serde(rename = "phoneNumber", skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub pass: String,
    /// Second entry of the password; checked locally, never sent.
    #[serde(skip)]
    pub pass_confirmation: String,
}

impl Registration {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.name, "name")?;
        require(&self.email, "email")?;
        require(&self.birthdate, "birthdate")?;
        require(&self.user_name, "userName")?;
        require(&self.pass, "pass")?;

        if !looks_like_email(self.email.trim()) {
            return Err(ValidationError::InvalidEmail);
        }
        if self.pass != self.pass_confirmation {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "access_token", alias = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refresh_token", alias = "refreshToken", default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: String,
    #[serde(rename = "refreshToken", alias = "refresh_token", default)]
    pub refresh_token: Option<String>,
}

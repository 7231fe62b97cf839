use regex::Regex;
use std::sync::OnceLock;

use super::ApiError;

const MAX_EMAIL_LEN: usize = 254;
const MAX_USERNAME_LEN: usize = 50;
const MAX_BIO_LEN: usize = 500;
const MAX_AVATAR_URL_LEN: usize = 2048;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

pub fn require<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let email = require(email, "Email")?;

    if email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::validation(format!(
            "Email must be {MAX_EMAIL_LEN} characters or less"
        )));
    }

    let valid = email_regex().is_some_and(|re| re.is_match(email));
    if !valid {
        return Err(ApiError::validation("Invalid email format"));
    }
    Ok(email)
}

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    let username = require(username, "Username")?;

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(format!(
            "Username must be {MAX_USERNAME_LEN} characters or less"
        )));
    }
    Ok(username)
}

pub fn validate_bio(bio: &str) -> Result<&str, ApiError> {
    if bio.chars().count() > MAX_BIO_LEN {
        return Err(ApiError::validation(format!(
            "Bio must be {MAX_BIO_LEN} characters or less"
        )));
    }
    Ok(bio)
}

pub fn validate_avatar_url(url: &str) -> Result<&str, ApiError> {
    if url.is_empty() {
        return Ok(url);
    }

    if url.len() > MAX_AVATAR_URL_LEN {
        return Err(ApiError::validation("Avatar URL is too long"));
    }

    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
        _ => Err(ApiError::validation("Avatar URL must be an http(s) URL")),
    }
}

use validator::validate_email;

#[derive(Debug, thiserror::Error)]
pub enum SubscriberEmailError {
    #[error("Email cannot be empty")]
    Empty,
    #[error("{0} is not a valid email address")]
    Malformed(String),
}

/// An email address whose syntax has been checked. Deliverability is never
/// checked.
#[derive(Clone, Debug)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(s: String) -> Result<Self, SubscriberEmailError> {
        if s.trim().is_empty() {
            Err(SubscriberEmailError::Empty)
        } else if validate_email(&s) {
            Ok(Self(s))
        } else {
            Err(SubscriberEmailError::Malformed(s))
        }
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

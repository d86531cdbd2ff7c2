use serde::{Deserialize, Serialize};

// Stable identity of an authenticated user. Keys the recurring job, the
// cached video message and the session token claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Principal(String);

impl Principal {
    pub fn new(username: &str) -> Self {
        Self(username.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Principal::new(value)
    }
}

impl From<String> for Principal {
    fn from(value: String) -> Self {
        Principal::new(&value)
    }
}

impl From<Principal> for String {
    fn from(value: Principal) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_is_case_normalized() {
        assert_eq!(Principal::new("Alice"), Principal::new("alice"));
        assert_eq!(Principal::new("  BOB ").as_str(), "bob");
    }

    #[test]
    fn test_deserialized_principal_is_normalized() {
        let principal: Principal = serde_json::from_str("\" Alice \"").unwrap();
        assert_eq!(principal, Principal::new("alice"));
        assert_eq!(serde_json::to_string(&principal).unwrap(), "\"alice\"");
    }
}

//! Lead model: an application submitted through the public contact form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a lead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    InProgress,
    Completed,
    Cancelled,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::InProgress => "in_progress",
            LeadStatus::Completed => "completed",
            LeadStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LeadStatus::New),
            "in_progress" => Ok(LeadStatus::InProgress),
            "completed" => Ok(LeadStatus::Completed),
            "cancelled" => Ok(LeadStatus::Cancelled),
            other => Err(format!("Unknown lead status: {}", other)),
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prospective customer's request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub message: String,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields captured by the contact form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub message: String,
}

impl NewLead {
    /// Contact form rules: name, phone and message are required, phone needs
    /// at least ten digits, email is optional but must look like an address.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        let digits = self.phone.chars().filter(|c| c.is_ascii_digit()).count();
        if digits < 10 {
            return Err("Phone number must contain at least 10 digits".to_string());
        }
        if let Some(email) = self.email.as_deref().map(str::trim) {
            if !email.is_empty() && !looks_like_email(email) {
                return Err("Email address is invalid".to_string());
            }
        }
        if self.message.trim().is_empty() {
            return Err("Message is required".to_string());
        }
        Ok(())
    }

    /// Blank optional email collapses to `None`.
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.contains(char::is_whitespace)
        && domain
            .rsplit_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && tld.len() >= 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> NewLead {
        NewLead {
            name: "Ivan Petrov".to_string(),
            phone: "+7 (900) 123-45-67".to_string(),
            email: Some("ivan@example.ru".to_string()),
            message: "Need a quote for Moscow to Almaty".to_string(),
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&LeadStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!("cancelled".parse::<LeadStatus>(), Ok(LeadStatus::Cancelled));
        assert!("archived".parse::<LeadStatus>().is_err());
        assert!(serde_json::from_str::<LeadStatus>("\"done\"").is_err());
    }

    #[test]
    fn test_valid_form() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_form_rejects_missing_fields() {
        let mut lead = form();
        lead.name = "  ".to_string();
        assert_eq!(lead.validate().unwrap_err(), "Name is required");

        let mut lead = form();
        lead.phone = "12-34".to_string();
        assert!(lead.validate().is_err());

        let mut lead = form();
        lead.message = String::new();
        assert_eq!(lead.validate().unwrap_err(), "Message is required");
    }

    #[test]
    fn test_form_email_is_optional() {
        let mut lead = form();
        lead.email = Some("   ".to_string());
        assert!(lead.validate().is_ok());
        assert!(lead.normalized_email().is_none());

        lead.email = Some("not-an-email".to_string());
        assert_eq!(lead.validate().unwrap_err(), "Email address is invalid");
    }
}

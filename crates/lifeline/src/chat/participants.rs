//! Resolving the other party of a two-person conversation

use crate::models::{Conversation, Role};

/// Display data for a conversation participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub email: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub role: Option<Role>,
}

/// Find the participant who isn't `own_email` (case-insensitive)
///
/// Profile data comes from the conversation's denormalized participant
/// users; when it is missing the name is synthesized from the email.
pub fn other_party(conversation: &Conversation, own_email: &str) -> Option<Participant> {
    let email = conversation
        .participants
        .iter()
        .find(|p| !p.eq_ignore_ascii_case(own_email))?;

    let profile = conversation.participant_user(email);
    let name = profile
        .and_then(|p| p.name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| display_name_from_email(email));

    Some(Participant {
        email: email.clone(),
        name,
        photo_url: profile.and_then(|p| p.photo_url.clone()),
        role: profile.and_then(|p| p.role),
    })
}

/// Fallback display name: the local part of an email address
pub fn display_name_from_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, _)) if !local.is_empty() => local.to_string(),
        _ => email.to_string(),
    }
}

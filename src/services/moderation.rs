//! Server-side validation pipeline for announcement submissions.
//!
//! Runs in this order:
//! 1. trimmed message must be 1..=500 characters
//! 2. `type` must be one of info / warning / success
//! 3. profanity check (rejects, offering a masked suggestion)
//! 4. suspicious payload patterns on the raw text
//! 5. markup stripping
//! 6. profanity and suspicious payload patterns again on the stripped
//!    text, and the length rule again in case nothing but markup was
//!    submitted

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    error::AnnouncementError,
    models::announcement::{AnnouncementKind, CreateAnnouncementRequest, MAX_MESSAGE_CHARS},
};

const PROFANITY: &[&str] = &[
    "arse", "arsehole", "asshole", "bastard", "bitch", "bollocks", "bullshit", "crap", "cunt",
    "damn", "dick", "dickhead", "fuck", "fucker", "fucking", "motherfucker", "piss", "prick",
    "shit", "shitty", "slut", "twat", "wanker", "whore",
];

lazy_static! {
    static ref PROFANITY_RE: Regex = Regex::new(&format!(
        r"(?i)\b(?:{})\b",
        PROFANITY.join("|")
    ))
    .unwrap();

    static ref SUSPICIOUS: Vec<Regex> = vec![
        Regex::new(r"(?i)javascript:").unwrap(),
        Regex::new(r"(?i)<script").unwrap(),
        Regex::new(r"(?i)\bon\w+\s*=").unwrap(),
        Regex::new(r"(?i)data:text/html").unwrap(),
    ];

    static ref SCRIPT_OR_STYLE_BLOCK: Regex =
        Regex::new(r"(?is)<(?:script|style)\b[^>]*>.*?</(?:script|style)\s*>").unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<[A-Za-z!/?][^>]*>").unwrap();
}

/// A submission that passed every check, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAnnouncement {
    pub message: String,
    pub kind: AnnouncementKind,
    pub enabled: bool,
}

pub fn validate(req: &CreateAnnouncementRequest) -> Result<ValidatedAnnouncement, AnnouncementError> {
    let message = check_length(&req.message)?;
    let kind = parse_kind(req.kind.as_deref())?;

    reject_profanity(message)?;
    reject_suspicious(message)?;

    let sanitized = sanitize(message);
    reject_profanity(&sanitized)?;
    reject_suspicious(&sanitized)?;
    let sanitized = check_length(&sanitized)?;

    Ok(ValidatedAnnouncement {
        message: sanitized.to_owned(),
        kind,
        enabled: req.enabled.unwrap_or(true),
    })
}

/// Trims `message` and enforces the 1..=500 character rule.
pub fn check_length(message: &str) -> Result<&str, AnnouncementError> {
    let trimmed = message.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AnnouncementError::validation(format!(
            "Message must be between 1 and {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

fn parse_kind(kind: Option<&str>) -> Result<AnnouncementKind, AnnouncementError> {
    kind.and_then(|k| k.parse().ok())
        .ok_or_else(|| AnnouncementError::validation("Type must be info, warning, or success"))
}

pub fn is_profane(message: &str) -> bool {
    PROFANITY_RE.is_match(message)
}

/// Replaces every listed word with asterisks of the same length.
pub fn mask_profanity(message: &str) -> String {
    PROFANITY_RE
        .replace_all(message, |caps: &regex::Captures| "*".repeat(caps[0].chars().count()))
        .into_owned()
}

/// Removes all markup, keeping only text content. Script and style
/// bodies are dropped along with their tags. A `<` that does not open a
/// tag (`3 < 5`) is left alone.
pub fn sanitize(message: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE_BLOCK.replace_all(message, "");
    TAG.replace_all(&without_blocks, "").trim().to_owned()
}

fn reject_profanity(message: &str) -> Result<(), AnnouncementError> {
    if is_profane(message) {
        return Err(AnnouncementError::ContentRejected {
            reason: "Message contains inappropriate content".into(),
            filtered: Some(mask_profanity(message)),
        });
    }
    Ok(())
}

fn reject_suspicious(message: &str) -> Result<(), AnnouncementError> {
    if SUSPICIOUS.iter().any(|re| re.is_match(message)) {
        return Err(AnnouncementError::ContentRejected {
            reason: "Message contains potentially malicious content".into(),
            filtered: None,
        });
    }
    Ok(())
}

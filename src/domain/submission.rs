use chrono::SecondsFormat;

use super::RequestType;
use super::RequiredText;
use crate::archive::ArchiveRecord;

const PHONE_PLACEHOLDER: &str = "(not provided)";

/// A form submission that passed field and request type validation.
#[derive(Debug, Clone)]
pub struct Submission {
    pub name: RequiredText,
    /// Only checked for presence, not shape
    pub email: RequiredText,
    pub phone: Option<String>,
    pub message: RequiredText,
    pub request_type: RequestType,
}

impl Submission {
    pub fn email_subject(&self) -> String {
        format!(
            "{} request from {}",
            self.request_type.as_ref(),
            self.name.as_ref()
        )
    }

    /// Plain-text body. When the submission was archived, the record's id and
    /// timestamp are appended so the email can be matched with the backup.
    pub fn email_text(
        &self,
        archived: Option<&ArchiveRecord>,
    ) -> String {
        let mut text = format!(
            "Request type: {}\nName: {}\nEmail: {}\nPhone: {}\n\nMessage:\n{}\n",
            self.request_type.as_ref(),
            self.name.as_ref(),
            self.email.as_ref(),
            self.phone.as_deref().unwrap_or(PHONE_PLACEHOLDER),
            self.message.as_ref(),
        );
        if let Some(record) = archived {
            text.push_str(&format!(
                "\nArchive ID: {}\nSubmitted at: {}\n",
                record.id,
                record
                    .submitted_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
        text
    }
}

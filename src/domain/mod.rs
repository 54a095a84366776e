mod request_type;
mod required_text;
mod submission;
pub use request_type::RequestType;
pub use required_text::RequiredText;
pub use submission::Submission;

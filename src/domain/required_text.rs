/// User-submitted text that must not be blank. Surrounding whitespace is
/// stripped; the inner text is kept exactly as submitted.
///
/// Must be instantiated with `RequiredText::parse`.
#[derive(Debug, Clone)]
pub struct RequiredText(String);

impl RequiredText {
    pub fn parse(text: String) -> Result<Self, String> {
        let trimmed = text.trim();
        match trimmed.is_empty() {
            true => Err("Required text is empty".to_string()),
            false => Ok(Self(trimmed.to_string())),
        }
    }
}

impl AsRef<str> for RequiredText {
    fn as_ref(&self) -> &str { &self.0 }
}

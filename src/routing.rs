use serde::Deserialize;

/// Where a single request type is delivered. Either side may be left out, in
/// which case the table-wide default is used.
#[derive(Deserialize, Clone, Debug)]
pub struct RequestTypeRoute {
    pub name: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
}

/// The enumeration of accepted request types, and the addresses each of them
/// is relayed with.
///
/// Entries are data, not code: adding a category is a configuration change
/// (see `configuration/base.yaml`).
#[derive(Deserialize, Clone, Debug)]
pub struct RouteTable {
    #[serde(default)]
    pub default_sender: Option<String>,
    #[serde(default)]
    pub default_recipient: Option<String>,
    #[serde(default)]
    pub request_types: Vec<RequestTypeRoute>,
}

/// Resolved pair of addresses for one submission
#[derive(Debug, PartialEq, Eq)]
pub struct Route<'a> {
    pub sender: &'a str,
    pub recipient: &'a str,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RouteError {
    #[error("Recipient email not configured.")]
    MissingRecipient,
    #[error("Sender email not configured.")]
    MissingSender,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `Sales` -> `SALES`, `Site Visit` -> `SITE_VISIT`
fn variable_prefix(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c.is_ascii_alphanumeric() {
            true => c.to_ascii_uppercase(),
            false => '_',
        })
        .collect()
}

impl RouteTable {
    /// Apply per-type addresses from variables named after each configured
    /// type: `<TYPE>_TO_EMAIL` sets the recipient and `<TYPE>_FROM_EMAIL` the
    /// sender (`SALES_TO_EMAIL` for `Sales`). A variable that is set wins over
    /// the yaml files; an empty one unsets the override, so the default
    /// applies.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        for route in &mut self.request_types {
            let prefix = variable_prefix(&route.name);
            if let Some(recipient) = lookup(&format!("{prefix}_TO_EMAIL")) {
                route.recipient = Some(recipient);
            }
            if let Some(sender) = lookup(&format!("{prefix}_FROM_EMAIL")) {
                route.sender = Some(sender);
            }
        }
        self
    }

    fn entry(
        &self,
        name: &str,
    ) -> Option<&RequestTypeRoute> {
        self.request_types.iter().find(|r| r.name == name)
    }

    /// Exact, case-sensitive membership
    pub fn is_known(
        &self,
        name: &str,
    ) -> bool {
        !name.is_empty() && self.entry(name).is_some()
    }

    /// Sender and recipient are resolved independently: a type may override
    /// one and inherit the other. Unknown types get the defaults.
    pub fn resolve(
        &self,
        name: &str,
    ) -> Result<Route<'_>, RouteError> {
        let entry = self.entry(name);

        let recipient = entry
            .and_then(|e| non_empty(&e.recipient))
            .or_else(|| non_empty(&self.default_recipient))
            .ok_or(RouteError::MissingRecipient)?;

        let sender = entry
            .and_then(|e| non_empty(&e.sender))
            .or_else(|| non_empty(&self.default_sender))
            .ok_or(RouteError::MissingSender)?;

        Ok(Route { sender, recipient })
    }
}

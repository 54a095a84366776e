use crate::routing::RouteTable;

/// A request category accepted by the route table, e.g. `Sales`.
#[derive(Debug, Clone)]
pub struct RequestType(String);

impl RequestType {
    /// The value is trimmed first, then matched exactly (case-sensitive)
    /// against the configured enumeration.
    pub fn parse(
        value: String,
        table: &RouteTable,
    ) -> Result<Self, String> {
        let value = value.trim();
        match table.is_known(value) {
            true => Ok(Self(value.to_string())),
            false => Err(format!("Invalid request type: {value:?}")),
        }
    }
}

impl AsRef<str> for RequestType {
    fn as_ref(&self) -> &str { &self.0 }
}

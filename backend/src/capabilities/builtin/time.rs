//! Current time resource: `time://current`.

use crate::capabilities::handler::{CapabilityError, ResourceReader};
use abacus_types::{ReadResourceResult, Resource, ResourceContents};
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;

pub const TIME_URI: &str = "time://current";

pub fn resource() -> Resource {
    Resource {
        uri: TIME_URI.to_string(),
        name: "time".to_string(),
        mime_type: None,
    }
}

/// Returns the current server time as an RFC 3339 UTC timestamp.
pub struct CurrentTime;

impl ResourceReader for CurrentTime {
    fn read(
        &self,
        uri: &str,
        _variables: &HashMap<String, String>,
    ) -> Result<ReadResourceResult, CapabilityError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: uri.to_string(),
                mime_type: None,
                text: format!("Current time: {}", now),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_format() {
        let result = CurrentTime.read(TIME_URI, &HashMap::new()).unwrap();
        let text = &result.contents[0].text;
        let timestamp = text.strip_prefix("Current time: ").unwrap();
        assert!(timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }
}

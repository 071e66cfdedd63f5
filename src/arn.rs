//! ARN-style sink identifiers.
//!
//! Sink URIs for the non-console backends are fully-qualified ARNs
//! (`arn:<partition>:<service>:<region>:<account>:<resource>`). The service
//! field selects the backend; region/account/resource address it.

use std::fmt;
use std::str::FromStr;

/// Parse failure for a sink ARN.
#[derive(Debug, thiserror::Error)]
#[error("invalid arn: {0}")]
pub struct ArnError(String);

/// A parsed sink identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource: String,
    /// Set when the resource carries a `type/name` or `type:name` prefix.
    pub resource_type: Option<String>,
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" {
            return Err(ArnError(s.to_string()));
        }

        let (resource_type, resource) = split_resource(parts[5]);

        Ok(Arn {
            partition: parts[1].to_string(),
            service: parts[2].to_string(),
            region: parts[3].to_string(),
            account: parts[4].to_string(),
            resource,
            resource_type,
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:",
            self.partition, self.service, self.region, self.account
        )?;
        match &self.resource_type {
            Some(rtype) => write!(f, "{rtype}/{}", self.resource),
            None => write!(f, "{}", self.resource),
        }
    }
}

/// A resource field may embed its type as `type/name` or `type:name`.
fn split_resource(raw: &str) -> (Option<String>, String) {
    if let Some((rtype, name)) = raw.split_once('/') {
        (Some(rtype.to_string()), name.to_string())
    } else if let Some((rtype, name)) = raw.split_once(':') {
        (Some(rtype.to_string()), name.to_string())
    } else {
        (None, raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_arn() {
        let arn: Arn = "arn:aws:kinesis:us-east-1:644160558196:policy-changes"
            .parse()
            .unwrap();
        assert_eq!(arn.service, "kinesis");
        assert_eq!(arn.region, "us-east-1");
        assert_eq!(arn.account, "644160558196");
        assert_eq!(arn.resource, "policy-changes");
        assert_eq!(arn.resource_type, None);
    }

    #[test]
    fn splits_slash_resource_type() {
        let arn: Arn = "arn:aws:dynamodb:us-west-2:123456789012:table/changes"
            .parse()
            .unwrap();
        assert_eq!(arn.resource_type.as_deref(), Some("table"));
        assert_eq!(arn.resource, "changes");
    }

    #[test]
    fn splits_colon_resource_type() {
        let arn: Arn = "arn:aws:sqs:us-east-1:123456789012:queue:changes.fifo"
            .parse()
            .unwrap();
        assert_eq!(arn.resource_type.as_deref(), Some("queue"));
        assert_eq!(arn.resource, "changes.fifo");
    }

    #[test]
    fn rejects_short_and_non_arn() {
        assert!("arn:aws:sqs".parse::<Arn>().is_err());
        assert!("https://example.com".parse::<Arn>().is_err());
    }
}

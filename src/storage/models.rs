//! Data models for the storage layer

use serde::{Deserialize, Serialize};

/// One request observation reported by a frontend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedEvent {
    /// Reporting frontend (reverse proxy) name
    #[serde(rename = "frontendName", default)]
    pub frontend_name: String,
    /// Host identity of the backend that stored the event.
    /// Filled in by the store; ignored on input.
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub method: String,
    #[serde(rename = "XForwardFor", default)]
    pub x_forward_for: String,
    #[serde(rename = "XRealIP", default)]
    pub x_real_ip: String,
    #[serde(rename = "useragent", default)]
    pub user_agent: String,
    #[serde(default)]
    pub via: String,
    #[serde(default)]
    pub age: String,
    /// Unix epoch seconds
    #[serde(rename = "timeDate", default)]
    pub time_date: i64,
    #[serde(rename = "CF-IPCountry", default)]
    pub cf_ip_country: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub banned: bool,
}

/// Moderation entry for a source address.
///
/// The zero value means "not banned".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannedEntity {
    /// Not persisted
    #[serde(rename = "frontendName")]
    pub frontend_name: String,
    #[serde(rename = "timeDateBanned")]
    pub time_banned: i64,
    #[serde(rename = "timeDateChecked")]
    pub time_checked: i64,
    pub ip: String,
    #[serde(rename = "domainName")]
    pub domain_name: String,
    pub banned: bool,
}

/// Outcome of a schema bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStatus {
    AlreadyExists,
    Created,
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStatus::AlreadyExists => write!(f, "exists"),
            SchemaStatus::Created => write!(f, "created"),
        }
    }
}

/// Outcome of a store liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessStatus {
    Found,
    NotFound,
    QueryFailed,
}

impl std::fmt::Display for LivenessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LivenessStatus::Found => write!(f, "found"),
            LivenessStatus::NotFound => write!(f, "not found"),
            LivenessStatus::QueryFailed => write!(f, "query failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collected_event_wire_names() {
        let json = r#"{
            "frontendName": "edge-1",
            "timeDate": 1700000000,
            "ip": "203.0.113.5",
            "port": 443,
            "path": "/login",
            "method": "POST",
            "XForwardFor": "198.51.100.7",
            "XRealIP": "198.51.100.7",
            "useragent": "curl/8.4.0",
            "via": "1.1 edge-1",
            "age": "0",
            "CF-IPCountry": "NL"
        }"#;

        let event: CollectedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.frontend_name, "edge-1");
        assert_eq!(event.time_date, 1_700_000_000);
        assert_eq!(event.port, 443);
        assert_eq!(event.x_forward_for, "198.51.100.7");
        assert_eq!(event.user_agent, "curl/8.4.0");
        assert_eq!(event.cf_ip_country, "NL");
        assert!(event.backend.is_empty());
        assert!(!event.checked);
        assert!(!event.banned);
    }

    #[test]
    fn test_collected_event_missing_fields_default() {
        let event: CollectedEvent = serde_json::from_str(r#"{"ip": "10.0.0.1"}"#).unwrap();
        assert_eq!(event.ip, "10.0.0.1");
        assert_eq!(event.port, 0);
        assert!(event.path.is_empty());
    }

    #[test]
    fn test_collected_event_rejects_wrong_type() {
        let result = serde_json::from_str::<CollectedEvent>(r#"{"port": "443"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_banned_entity_zero_value_serializes_unbanned() {
        let value = serde_json::to_value(BannedEntity::default()).unwrap();
        assert_eq!(value["banned"], false);
        assert_eq!(value["ip"], "");
        assert_eq!(value["timeDateBanned"], 0);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SchemaStatus::Created.to_string(), "created");
        assert_eq!(SchemaStatus::AlreadyExists.to_string(), "exists");
        assert_eq!(LivenessStatus::Found.to_string(), "found");
        assert_eq!(LivenessStatus::QueryFailed.to_string(), "query failed");
    }
}

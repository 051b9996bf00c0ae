//! Object store descriptor types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner of a listed object, when the store reports one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub display_name: Option<String>,
}

/// Descriptor of one object as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
    pub storage_class: String,
    pub owner: Option<Owner>,
}

impl RemoteObject {
    /// The `bucket/key` identifier a blob cache files this object under
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    /// Token for the next page; `None` on the last page
    pub next_continuation_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RemoteObject {
        RemoteObject {
            bucket: "cwru-data".to_string(),
            key: "network/wifi/2021/04/02/1617395308614_AccessPointDetailsv4.csv.gz".to_string(),
            size: 4096,
            last_modified: Utc::now(),
            etag: "\"d41d8cd98f00b204e9800998ecf8427e\"".to_string(),
            storage_class: "STANDARD".to_string(),
            owner: None,
        }
    }

    #[test]
    fn test_identifier_joins_bucket_and_key() {
        assert_eq!(
            sample().identifier(),
            "cwru-data/network/wifi/2021/04/02/1617395308614_AccessPointDetailsv4.csv.gz"
        );
    }

    #[test]
    fn test_remote_object_serialization() {
        let object = sample();
        let json = serde_json::to_string(&object).unwrap();
        assert!(json.contains("STANDARD"));
        assert!(json.contains("4096"));

        let deserialized: RemoteObject = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, object);
    }

    #[test]
    fn test_object_page_default_is_last() {
        let page = ObjectPage::default();
        assert!(page.objects.is_empty());
        assert!(page.next_continuation_token.is_none());
    }
}

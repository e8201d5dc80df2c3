use serde::{Deserialize, Serialize};

use crate::{
    domain::{BlockContent, BlockId, BlockType, PageId, ResponsiveBlockLayout},
    handle::PageHandle,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveLayoutRequest {
    pub page_id: PageId,
    pub placements: Vec<ResponsiveBlockLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBlockRequest {
    pub page_id: PageId,
    pub handle: PageHandle,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub data: BlockContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBlockRequest {
    pub block_id: BlockId,
    pub handle: PageHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOrdering {
    pub id: BlockId,
    pub ordering: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderBlocksRequest {
    pub page_id: PageId,
    pub handle: PageHandle,
    pub blocks: Vec<BlockOrdering>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Loading,
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            kind,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_carries_type_and_handle_as_strings() {
        let request = CreateBlockRequest {
            page_id: PageId::from("page-1"),
            handle: PageHandle::parse("alice").expect("handle"),
            block_type: BlockType::Link,
            data: BlockContent::default(),
        };
        let encoded = serde_json::to_value(&request).expect("encode");
        assert_eq!(encoded["type"], "link");
        assert_eq!(encoded["handle"], "alice");
    }

    #[test]
    fn notification_omits_missing_description() {
        let encoded =
            serde_json::to_string(&Notification::new(NotificationKind::Loading, "Deleting block"))
                .expect("encode");
        assert_eq!(encoded, r#"{"title":"Deleting block","type":"loading"}"#);
    }
}

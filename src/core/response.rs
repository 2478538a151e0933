use crate::utils::error::IngestError;
use serde::Serialize;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;

/// 呼叫結果的 JSON 外層：成功為 `{"replies": [...]}`，失敗為 `{"errorMessage": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Replies {
        replies: Vec<Option<u64>>,
    },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl ResponseEnvelope {
    pub fn success(row_count: Option<u64>) -> Self {
        ResponseEnvelope::Replies {
            replies: vec![row_count],
        }
    }

    pub fn failure(error: &IngestError) -> Self {
        ResponseEnvelope::Error {
            error_message: error.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ResponseEnvelope::Replies { .. } => STATUS_OK,
            ResponseEnvelope::Error { .. } => STATUS_BAD_REQUEST,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Replies { .. })
    }

    pub fn to_json(&self) -> String {
        // 只含字串與整數，序列化不會失敗
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

use crate::domain::model::ObjectLocator;
use crate::utils::error::{IngestError, Result};
use serde::Deserialize;
use std::collections::HashMap;

pub const CONTEXT_DESTINATION_BUCKET: &str = "destinationBucket";
pub const CONTEXT_DESTINATION_TABLE: &str = "destinationTable";
pub const CONTEXT_DESTINATION_FILE_NAME: &str = "destinationFileName";

/// 觸發請求：`{"calls": [[locator, ...], ...]}`，另可帶遠端函式的中繼欄位
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    pub calls: Vec<Vec<serde_json::Value>>,
    pub request_id: Option<String>,
    pub caller: Option<String>,
    pub session_user: Option<String>,
    #[serde(default)]
    pub user_defined_context: HashMap<String, String>,
}

/// 解析後的請求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub locator: ObjectLocator,
    pub request_id: Option<String>,
    pub context: HashMap<String, String>,
}

impl InvocationRequest {
    /// 每個 call 取第一個元素，最後一個勝出
    pub fn resolve(self) -> Result<ResolvedRequest> {
        let mut resolved: Option<String> = None;

        for (index, call) in self.calls.iter().enumerate() {
            let first = call.first().ok_or_else(|| {
                IngestError::invalid_request(format!("call {} has no arguments", index))
            })?;
            let locator = first.as_str().ok_or_else(|| {
                IngestError::invalid_request(format!(
                    "call {} first argument is not a string: {}",
                    index, first
                ))
            })?;
            resolved = Some(locator.to_string());
        }

        let locator = resolved.ok_or_else(|| IngestError::invalid_request("'calls' is empty"))?;
        if self.calls.len() > 1 {
            tracing::warn!(
                "Request carries {} calls; only the last locator is processed",
                self.calls.len()
            );
        }

        Ok(ResolvedRequest {
            locator: locator.parse()?,
            request_id: self.request_id,
            context: self.user_defined_context,
        })
    }
}

/// 從原始請求 body 解析出來源物件
pub fn resolve_request(body: &[u8]) -> Result<ResolvedRequest> {
    let request: InvocationRequest = serde_json::from_slice(body)
        .map_err(|e| IngestError::invalid_request(format!("invalid request payload: {}", e)))?;
    request.resolve()
}

//! Structured API responses.
//!
//! Actions return an [`ApiResponse`] to get a JSON body; anything else is
//! rendered as HTML.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i64,
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

impl ApiResponse {
    pub const SUCCESS: i64 = 0;
    pub const USER_NOT_LOGIN: i64 = 401;

    pub fn ok(data: Value) -> Self {
        Self {
            code: Self::SUCCESS,
            msg: "success".to_string(),
            data,
        }
    }

    pub fn error(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: Value::Null,
        }
    }

    pub fn not_logged_in() -> Self {
        Self::error(Self::USER_NOT_LOGIN, "user not login")
    }

    pub fn set_code(&mut self, code: i64) -> &mut Self {
        self.code = code;
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "code": self.code,
            "msg": self.msg,
            "data": self.data,
        })
    }
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self::ok(Value::Null)
    }
}

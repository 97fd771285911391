//! 提取结果记录
//!
//! 一个链接的结构化结果：`{name, price}`，或者在修复后仍无法解析时为空 `{}`。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

/// 价格：数字或文本（税后价）
///
/// 数字原样保留（整数不会变成浮点数）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Amount(Number),
    Text(String),
}

/// 提取结果
///
/// 空记录是合法的终态值，不是错误。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// 模型额外返回的字段（如 currency），原样保留
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// 严格解析失败的原因
#[derive(Debug, Error)]
pub enum RecordParseError {
    #[error("不是合法的 JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("JSON 顶层不是对象")]
    NotAnObject,
    #[error("缺少字段: {0}")]
    MissingField(&'static str),
    #[error("字段 {field} 类型不正确: {found}")]
    InvalidField { field: &'static str, found: String },
}

impl Record {
    /// 空记录 `{}`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(name: impl Into<String>, price: Price) -> Self {
        Self {
            name: Some(name.into()),
            price: Some(price),
            extra: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.extra.is_empty()
    }

    /// 严格解析模型文本
    ///
    /// 不做任何容错（不剥离代码块），必须是含 `name`（字符串）和
    /// `price`（数字或字符串）的 JSON 对象。
    pub fn parse_strict(text: &str) -> Result<Self, RecordParseError> {
        let value: JsonValue = serde_json::from_str(text)?;
        let JsonValue::Object(mut fields) = value else {
            return Err(RecordParseError::NotAnObject);
        };

        let name = match fields.remove("name") {
            Some(JsonValue::String(name)) => name,
            Some(other) => {
                return Err(RecordParseError::InvalidField {
                    field: "name",
                    found: other.to_string(),
                })
            }
            None => return Err(RecordParseError::MissingField("name")),
        };

        let price = match fields.remove("price") {
            Some(JsonValue::Number(n)) => Price::Amount(n),
            Some(JsonValue::String(text)) => Price::Text(text),
            Some(other) => {
                return Err(RecordParseError::InvalidField {
                    field: "price",
                    found: other.to_string(),
                })
            }
            None => return Err(RecordParseError::MissingField("price")),
        };

        Ok(Self {
            name: Some(name),
            price: Some(price),
            extra: fields,
        })
    }
}

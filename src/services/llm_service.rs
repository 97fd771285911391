//! LLM 服务 - 业务能力层
//!
//! 只负责"调用模型"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 密钥来自每次请求的凭据，而不是全局配置

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::Credentials;

/// 语言模型能力
///
/// 网页理解和 JSON 修复共用同一个接口。
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 发送一轮对话，返回模型回复
    async fn chat(
        &self,
        credentials: &Credentials,
        system_message: Option<&str>,
        user_message: &str,
    ) -> Result<String, LlmError>;

    /// 不带系统消息的单次补全
    async fn complete(&self, credentials: &Credentials, prompt: &str) -> Result<String, LlmError> {
        self.chat(credentials, None, prompt).await
    }
}

/// LLM 服务
///
/// 职责：
/// - 调用兼容 OpenAI 的 chat completions 接口
/// - 不出现 Record / Task
/// - 不重试（重试策略由上层决定）
pub struct LlmService {
    api_base_url: String,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        Self {
            api_base_url: config.llm_api_base_url.clone(),
            model_name: config.llm_model_name.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn client_for(&self, credentials: &Credentials) -> Client<OpenAIConfig> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&credentials.openai_key)
            .with_api_base(&self.api_base_url);
        Client::with_config(openai_config)
    }

    fn build_failed(&self, source: async_openai::error::OpenAIError) -> LlmError {
        LlmError::RequestBuildFailed {
            model: self.model_name.clone(),
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl LanguageModel for LlmService {
    async fn chat(
        &self,
        credentials: &Credentials,
        system_message: Option<&str>,
        user_message: &str,
    ) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| self.build_failed(e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| self.build_failed(e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(1024u32)
            .build()
            .map_err(|e| self.build_failed(e))?;

        let response = self
            .client_for(credentials)
            .chat()
            .create(request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                LlmError::api_failed(&self.model_name, e)
            })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

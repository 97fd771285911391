//! 单链接提取流程 - 流程层
//!
//! 核心职责：定义"一个链接"的完整处理流程
//!
//! 流程顺序：
//! 1. 浏览代理 → 最终文本答案
//! 2. 严格 JSON 解析
//! 3. 解析失败 → 一次模型修复 → 再次严格解析
//! 4. 仍然失败 → 空记录（不影响同批的其他链接）
//!
//! 代理调用本身失败时直接返回错误（带上出错的链接），不重试。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ScrapeError;
use crate::models::{Credentials, Record};
use crate::services::{AgentTask, BrowsingAgent, LanguageModel};
use crate::utils::logging::truncate_text;
use crate::workflow::extraction_ctx::ExtractionCtx;

const REPAIR_PROMPT_PREFIX: &str =
    "Make the json object valid and only respond with the object. no codeblocks, just the json object.: ";

/// 交给浏览代理的固定任务说明
pub fn product_instruction(url: &str) -> String {
    format!(
        "Go to {} and find the name and price of the product as json object with the following keys: name, price. Only give the after tax price.",
        url
    )
}

/// 修复提示词，以解析失败的原文为种子
pub fn repair_prompt(failed_text: &str) -> String {
    format!("{}{}", REPAIR_PROMPT_PREFIX, failed_text)
}

/// 单链接提取流程
///
/// - 编排"代理 → 解析 → 修复"
/// - 不持有任何浏览器资源
/// - 不关心批次和并发
pub struct ExtractionFlow {
    agent: Arc<dyn BrowsingAgent>,
    llm: Arc<dyn LanguageModel>,
    verbose_logging: bool,
}

impl ExtractionFlow {
    /// 创建新的提取流程
    pub fn new(agent: Arc<dyn BrowsingAgent>, llm: Arc<dyn LanguageModel>, config: &Config) -> Self {
        Self {
            agent,
            llm,
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn run(
        &self,
        ctx: &ExtractionCtx,
        credentials: &Credentials,
    ) -> Result<Record, ScrapeError> {
        info!("{} 🔍 启动浏览代理: {}", ctx, ctx.url);

        let task = AgentTask::new(&ctx.url, product_instruction(&ctx.url));
        let answer = self.agent.run(&task, credentials).await.map_err(|source| {
            error!("{} ❌ 浏览代理执行失败: {}", ctx, source);
            ScrapeError::Agent {
                url: ctx.url.clone(),
                source,
            }
        })?;

        if self.verbose_logging {
            info!("{} 代理答案: {}", ctx, truncate_text(&answer, 300));
        }

        match Record::parse_strict(&answer) {
            Ok(record) => {
                info!("{} ✓ 提取成功", ctx);
                Ok(record)
            }
            Err(e) => {
                warn!("{} ⚠️ 代理答案无法直接解析 ({})，尝试修复...", ctx, e);
                Ok(self.repair(ctx, credentials, &answer).await)
            }
        }
    }

    /// 一次修复：失败时返回空记录，从不报错
    async fn repair(&self, ctx: &ExtractionCtx, credentials: &Credentials, answer: &str) -> Record {
        let repaired = match self.llm.complete(credentials, &repair_prompt(answer)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("{} ⚠️ 修复调用失败，返回空记录: {}", ctx, e);
                return Record::empty();
            }
        };

        match Record::parse_strict(&repaired) {
            Ok(record) => {
                info!("{} ✓ 修复后提取成功", ctx);
                record
            }
            Err(e) => {
                warn!(
                    "{} ⚠️ 修复后仍无法解析 ({})，返回空记录: {}",
                    ctx,
                    e,
                    truncate_text(&repaired, 120)
                );
                Record::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::models::{Price, TaskId};
    use crate::test_support::{ScriptedAgent, ScriptedLlm};

    fn flow(agent: Arc<ScriptedAgent>, llm: Arc<ScriptedLlm>) -> ExtractionFlow {
        ExtractionFlow::new(agent, llm, &Config::default())
    }

    fn ctx(url: &str) -> ExtractionCtx {
        ExtractionCtx::new(TaskId::generate(), 1, 1, url)
    }

    fn credentials() -> Credentials {
        Credentials::new("sk-test", None)
    }

    #[tokio::test]
    async fn test_valid_answer_skips_repair() {
        let agent = Arc::new(ScriptedAgent::new().answer("u1", r#"{"name":"Widget","price":12.5}"#));
        let llm = Arc::new(ScriptedLlm::fence_stripping());

        let record = flow(agent, llm.clone()).run(&ctx("u1"), &credentials()).await.unwrap();

        let price = Price::Amount(serde_json::Number::from_f64(12.5).unwrap());
        assert_eq!(record, Record::new("Widget", price));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_fenced_answer_is_repaired() {
        let agent = Arc::new(
            ScriptedAgent::new().answer("u1", "```json\n{\"name\": \"X\", \"price\": 9.99}\n```"),
        );
        let llm = Arc::new(ScriptedLlm::fence_stripping());

        let record = flow(agent, llm.clone()).run(&ctx("u1"), &credentials()).await.unwrap();

        let price = Price::Amount(serde_json::Number::from_f64(9.99).unwrap());
        assert_eq!(record, Record::new("X", price));
        assert_eq!(llm.calls(), 1);
        let prompt = llm.prompts().remove(0);
        assert!(prompt.starts_with("Make the json object valid"));
        assert!(prompt.ends_with("```"));
    }

    #[tokio::test]
    async fn test_failed_repair_yields_empty_record() {
        let agent = Arc::new(ScriptedAgent::new().answer("u1", "The price is 12 dollars"));
        let llm = Arc::new(ScriptedLlm::replying("Sorry, I cannot do that."));

        let record = flow(agent, llm.clone()).run(&ctx("u1"), &credentials()).await.unwrap();

        assert!(record.is_empty());
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_repair_call_error_yields_empty_record() {
        let agent = Arc::new(ScriptedAgent::new().answer("u1", "not json"));
        let llm = Arc::new(ScriptedLlm::failing("upstream 500"));

        let record = flow(agent, llm).run(&ctx("u1"), &credentials()).await.unwrap();

        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn test_schema_violation_goes_through_repair() {
        let agent = Arc::new(ScriptedAgent::new().answer("u1", r#"{"title":"X","cost":3}"#));
        let llm = Arc::new(ScriptedLlm::replying(r#"{"name":"X","price":3}"#));

        let record = flow(agent, llm.clone()).run(&ctx("u1"), &credentials()).await.unwrap();

        assert_eq!(record, Record::new("X", Price::Amount(3u64.into())));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_agent_failure_propagates_with_url() {
        let agent = Arc::new(ScriptedAgent::new().fail("https://b.example/p", "network unreachable"));
        let llm = Arc::new(ScriptedLlm::fence_stripping());

        let err = flow(agent, llm.clone())
            .run(&ctx("https://b.example/p"), &credentials())
            .await
            .unwrap_err();

        match err {
            ScrapeError::Agent { url, source } => {
                assert_eq!(url, "https://b.example/p");
                assert!(matches!(source, AgentError::Browser(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn test_instruction_mentions_url_and_after_tax() {
        let instruction = product_instruction("https://shop.example/p");
        assert!(instruction.contains("https://shop.example/p"));
        assert!(instruction.contains("keys: name, price"));
        assert!(instruction.contains("after tax"));
    }
}

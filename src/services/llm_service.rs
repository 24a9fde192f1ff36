//! LLM 服务 - 业务能力层
//!
//! 只负责"文本补全"能力，不关心评审流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::LlmConfig;

/// 文本补全能力
///
/// 评审流程 5~9 阶段和文章生成都只依赖这个 trait，测试中用 mock 替换
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// 发送一次补全请求，返回去掉首尾空白的文本
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    async fn complete(&self, user_message: &str, system_message: Option<&str>) -> Result<String>;

    /// 模型标识，写入结果元数据
    fn model_name(&self) -> &str;
}

/// 基于 OpenAI 兼容接口的 LLM 服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &LlmConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl TextCompletion for LlmService {
    async fn complete(&self, user_message: &str, system_message: Option<&str>) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// 从 LLM 响应中取出 JSON 对象
///
/// 兼容 ```json 代码块和前后带说明文字的情况，找不到时返回 None
pub fn extract_json_object(response: &str) -> Option<JsonValue> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<JsonValue>(&response[start..=end])
        .ok()
        .filter(|v| v.is_object())
}

/// 从文本中提取第一个数字
///
/// 用于结构化解析失败时的兜底，例如 "Soundness: 3/4" → 3.0
pub fn extract_first_number(text: &str) -> Option<f64> {
    for word in text.split(|c: char| c.is_whitespace() || c == '/' || c == ',') {
        let cleaned = word.trim_matches(|c: char| !c.is_ascii_digit() && c != '.');
        let cleaned = cleaned.trim_matches('.');
        if cleaned.is_empty() {
            continue;
        }
        if let Ok(value) = cleaned.parse::<f64>() {
            return Some(value);
        }
    }
    None
}

/// 相关工作搜索服务
///
/// 负责按检索词查找相关论文，只返回候选列表，不做排序
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::models::CandidateWork;

/// 相关工作搜索能力
///
/// 实现方可以返回错误，评审流程会把错误当作"没有候选"处理
#[async_trait]
pub trait RelatedWorkSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<CandidateWork>>;
}

/// Tavily 搜索（限定 arxiv.org）
pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: usize,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: String,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
}

impl TavilySearch {
    /// 创建新的搜索服务
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("无法创建 HTTP 客户端")?;

        Ok(Self {
            http,
            api_key: config.tavily_api_key.clone(),
            base_url: config.tavily_base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    /// 是否配置了 API key
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[async_trait]
impl RelatedWorkSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<CandidateWork>> {
        if !self.is_configured() {
            debug!("未配置 Tavily API key，跳过搜索: {}", query);
            return Ok(Vec::new());
        }

        let body = TavilyRequest {
            api_key: &self.api_key,
            query: format!("site:arxiv.org {}", query),
            max_results: self.max_results,
        };

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Tavily 请求失败")?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Tavily 返回错误状态: {}", status);
            anyhow::bail!("Tavily 返回错误状态: {}", status);
        }

        let parsed: TavilyResponse = response.json().await.context("无法解析 Tavily 响应")?;
        let candidates = parse_hits(parsed.results);
        debug!("Tavily 返回 {} 个结果: {}", candidates.len(), query);
        Ok(candidates)
    }
}

fn parse_hits(hits: Vec<TavilyHit>) -> Vec<CandidateWork> {
    hits.into_iter()
        .filter(|hit| !hit.title.trim().is_empty() || !hit.url.trim().is_empty())
        .map(|hit| CandidateWork {
            engine_score: hit.score,
            ..CandidateWork::new(hit.title.trim(), hit.content.trim(), hit.url.trim())
        })
        .collect()
}

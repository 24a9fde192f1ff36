//! 单篇论文分析编排器 - 编排层
//!
//! ## 职责
//!
//! 对一篇论文执行完整分析，并持有所有下游阶段的超时和失败隔离策略。
//!
//! ## 执行顺序
//!
//! 1. **内容提取**：失败或被取消即整次运行失败，不产出任何部分结果
//! 2. **并发扇出**：图表生成 ‖ 评审流程，互不取消
//! 3. **文章合成**：在扇出完成后执行（可选）
//! 4. **语音旁白**：所有文本产出之后执行（可选）
//! 5. **组装结果**：失败的可选阶段对应字段为 `None`，并记录一条 error 日志
//!
//! ## 取消
//!
//! 调用方传入的 `CancellationToken`（或配置的运行截止时间）会传播到所有挂起中的外部调用。
//! 被取消的可选阶段与失败的可选阶段表现一致。

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, PipelineConfig};
use crate::error::{AnalysisError, AppResult, CollaboratorUnavailable};
use crate::models::{AnalysisOptions, AnalysisResult, ResultMetadata};
use crate::orchestrator::summary::{key_points, summarize};
use crate::services::{
    build_narration, ArticleSynthesizer, DiagramGenerator, Extractor, FileExtractor, LlmService,
    MermaidDiagramGenerator, Narrator, RelatedWorkSearch, SpeechNarrator, TavilySearch,
    TextCompletion,
};
use crate::utils::logging::{log_stage_complete, log_stage_start};
use crate::workflow::ReviewStateMachine;

/// 分析编排器
///
/// 只持有协作方，不持有论文内容；同一个实例可以串行分析多篇论文
pub struct StageOrchestrator {
    extractor: Arc<dyn Extractor>,
    diagrams: Arc<dyn DiagramGenerator>,
    reviewer: ReviewStateMachine,
    article: Option<ArticleSynthesizer>,
    narrator: Option<Arc<dyn Narrator>>,
    pipeline: PipelineConfig,
}

/// 可选阶段的执行结果
struct StageOutcome<T> {
    value: Option<T>,
    /// 未启用时为 None
    elapsed_ms: Option<u64>,
}

impl StageOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - `extractor`: 内容提取（致命阶段）
    /// - `diagrams`: 图表生成
    /// - `reviewer`: 评审流程
    /// - `pipeline`: 超时和截止时间配置
    pub fn new(
        extractor: Arc<dyn Extractor>,
        diagrams: Arc<dyn DiagramGenerator>,
        reviewer: ReviewStateMachine,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            diagrams,
            reviewer,
            article: None,
            narrator: None,
            pipeline,
        }
    }

    pub fn with_article(mut self, article: ArticleSynthesizer) -> Self {
        self.article = Some(article);
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// 按配置装配全部默认协作方，图表和音频写到 `app.output_dir`
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_in(config, &config.app.output_dir)
    }

    /// 同 `from_config`，但图表和音频写到指定目录
    ///
    /// 批量分析时每篇论文一个目录，避免后一篇覆盖前一篇的文件
    pub fn from_config_in(config: &Config, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let llm: Arc<dyn TextCompletion> = Arc::new(LlmService::new(&config.llm));
        let search: Arc<dyn RelatedWorkSearch> = Arc::new(TavilySearch::new(&config.search)?);
        let output_dir: PathBuf = output_dir.into();

        let reviewer = ReviewStateMachine::new(Arc::clone(&llm), search, &config.review);
        let diagrams = MermaidDiagramGenerator::new(
            config.diagrams.write_files.then(|| output_dir.clone()),
        );

        let mut orchestrator = Self::new(
            Arc::new(FileExtractor::new()),
            Arc::new(diagrams),
            reviewer,
            config.pipeline.clone(),
        )
        .with_article(ArticleSynthesizer::new(llm, &config.storm));

        if config.tts.enabled {
            let narrator = SpeechNarrator::new(&config.tts, output_dir)?;
            orchestrator = orchestrator.with_narrator(Arc::new(narrator));
        }

        Ok(orchestrator)
    }

    /// 评审使用的模型
    pub fn review_model(&self) -> &str {
        self.reviewer.model_name()
    }

    /// 分析一篇论文
    pub async fn run(&self, source: &str, options: &AnalysisOptions) -> AppResult<AnalysisResult> {
        self.run_with_cancel(source, options, CancellationToken::new())
            .await
    }

    /// 分析一篇论文，`cancel` 被触发时停止所有挂起中的外部调用
    ///
    /// # 返回
    /// - 提取失败或提取前被取消：`Err(AnalysisError)`
    /// - 其余情况：完整的 `AnalysisResult`，失败的可选阶段字段为 `None`
    pub async fn run_with_cancel(
        &self,
        source: &str,
        options: &AnalysisOptions,
        cancel: CancellationToken,
    ) -> AppResult<AnalysisResult> {
        // 子 token：截止时间只取消本次运行，不影响调用方的 token
        let token = cancel.child_token();
        let deadline = self
            .pipeline
            .run_deadline()
            .map(|limit| arm_deadline(limit, token.clone()));

        let outcome = self.execute(source, options, &token).await;

        if let Some(handle) = deadline {
            handle.abort();
        }
        outcome
    }

    async fn execute(
        &self,
        source: &str,
        options: &AnalysisOptions,
        token: &CancellationToken,
    ) -> AppResult<AnalysisResult> {
        let started = Instant::now();
        let mut timings: BTreeMap<String, u64> = BTreeMap::new();

        // ========== 1. 内容提取（致命） ==========
        log_stage_start("内容提取");
        let extract_started = Instant::now();
        let content = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AnalysisError::cancelled("内容提取阶段被取消")),
            extracted = self.extractor.extract(source) => {
                extracted.map_err(|e| AnalysisError::extraction(source, e))?
            }
        };
        let extract_ms = elapsed_ms(extract_started);
        timings.insert("extraction".to_string(), extract_ms);
        log_stage_complete("内容提取", extract_ms, true);
        info!(
            "📄 《{}》: {} 个章节, {} 个公式, {} 条参考文献",
            content.title,
            content.sections.len(),
            content.equations.len(),
            content.references.len()
        );

        // ========== 2. 扇出：图表 ‖ 评审 ==========
        let diagram_future = optional_stage(
            "diagrams",
            options.generate_diagrams && !options.diagram_types.is_empty(),
            self.pipeline.diagram_timeout_secs,
            token,
            self.diagrams.generate(&content, &options.diagram_types),
        );
        let review_future = optional_stage(
            "review",
            options.generate_review,
            self.pipeline.review_timeout_secs,
            token,
            async {
                self.reviewer
                    .run(&content)
                    .await
                    .map_err(anyhow::Error::from)
            },
        );
        let (diagrams, review) = tokio::join!(diagram_future, review_future);
        record(&mut timings, "diagrams", &diagrams);
        record(&mut timings, "review", &review);

        // ========== 3. 文章合成 ==========
        let article = optional_stage(
            "article",
            options.generate_article,
            self.pipeline.article_timeout_secs,
            token,
            async {
                match &self.article {
                    Some(synthesizer) => synthesizer.synthesize(&content).await,
                    None => anyhow::bail!("未配置文章合成器"),
                }
            },
        )
        .await;
        record(&mut timings, "article", &article);
        let article = article.value.filter(|text| {
            let empty = text.trim().is_empty();
            if empty {
                warn!("⚠️ 文章合成返回空内容，忽略");
            }
            !empty
        });

        // ========== 4. 摘要 / 要点 / 旁白 ==========
        let review = review.value;
        let summary = summarize(&content);
        let key_points = key_points(&content, review.as_ref());
        debug!("生成 {} 个要点", key_points.len());

        let audio = optional_stage(
            "audio",
            options.generate_audio,
            self.pipeline.audio_timeout_secs,
            token,
            async {
                let narrator = match &self.narrator {
                    Some(narrator) => narrator,
                    None => anyhow::bail!("未配置语音合成"),
                };
                let script = build_narration(&content, &summary, &key_points, review.as_ref());
                narrator.synthesize(&script).await
            },
        )
        .await;
        record(&mut timings, "audio", &audio);

        // ========== 5. 组装 ==========
        let total_ms = elapsed_ms(started);
        let metadata = ResultMetadata {
            analysed_at: chrono::Local::now(),
            source: source.to_string(),
            review_model: self.reviewer.model_name().to_string(),
            diagram_provider: self.diagrams.provider().to_string(),
            stage_timings_ms: timings,
            total_ms,
        };

        info!("✅ 分析完成，总耗时 {} ms", total_ms);
        Ok(AnalysisResult {
            content,
            summary,
            key_points,
            review,
            diagrams: diagrams.value,
            article,
            audio: audio.value,
            metadata,
        })
    }
}

/// 执行一个可选阶段：未启用直接跳过，失败 / 超时 / 取消都记一条 error 日志并返回 None
async fn optional_stage<T, F>(
    stage: &'static str,
    enabled: bool,
    timeout_secs: u64,
    token: &CancellationToken,
    future: F,
) -> StageOutcome<T>
where
    F: Future<Output = Result<T>>,
{
    if !enabled {
        debug!("⏭️ {} 未启用，跳过", stage);
        return StageOutcome {
            value: None,
            elapsed_ms: None,
        };
    }

    log_stage_start(stage);
    let started = Instant::now();
    let value = match guarded(stage, timeout_secs, token, future).await {
        Ok(value) => Some(value),
        Err(e) => {
            error!("❌ [{}] 阶段失败，结果留空: {}", stage, e);
            None
        }
    };
    let elapsed = elapsed_ms(started);
    log_stage_complete(stage, elapsed, value.is_some());

    StageOutcome {
        value,
        elapsed_ms: Some(elapsed),
    }
}

/// 给外部调用加上取消和超时，`timeout_secs` 为 0 表示不限时
async fn guarded<T, F>(
    stage: &'static str,
    timeout_secs: u64,
    token: &CancellationToken,
    future: F,
) -> Result<T, CollaboratorUnavailable>
where
    F: Future<Output = Result<T>>,
{
    let limited = async {
        if timeout_secs == 0 {
            Ok(future.await)
        } else {
            tokio::time::timeout(Duration::from_secs(timeout_secs), future).await
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CollaboratorUnavailable::Cancelled { stage }),
        outcome = limited => match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(CollaboratorUnavailable::Failed { stage, source }),
            Err(_) => Err(CollaboratorUnavailable::TimedOut {
                stage,
                secs: timeout_secs,
            }),
        },
    }
}

fn arm_deadline(limit: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(limit).await;
        warn!("⏰ 超过运行截止时间 ({} 秒)，取消剩余阶段", limit.as_secs());
        token.cancel();
    })
}

fn record<T>(timings: &mut BTreeMap<String, u64>, stage: &str, outcome: &StageOutcome<T>) {
    if let Some(ms) = outcome.elapsed_ms {
        timings.insert(stage.to_string(), ms);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

//! 内容检索排序 - 纯计算
//!
//! 基于关键词重叠的检索，不依赖任何外部服务：
//! - 每个 chunk 预先计算小写词集合
//! - 查询按非字母数字切分后统计与 chunk 的重叠词数
//! - 得分相同按原始顺序排列（稳定排序）
//! - 永远返回 `min(k, 可用数量)` 个结果，即使所有得分都为 0

use std::collections::HashSet;

use crate::models::content::ContentChunk;

/// 带得分的检索结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a ContentChunk,
    /// 查询词与 chunk 的重叠词数
    pub score: usize,
    /// chunk 在语料中的原始位置
    pub position: usize,
}

struct RankEntry {
    chunk: ContentChunk,
    tokens: HashSet<String>,
}

/// 关键词重叠检索器
///
/// 语料在构建后不可变，所有方法都是同步的纯函数
pub struct ContentRanker {
    entries: Vec<RankEntry>,
}

impl ContentRanker {
    /// 构建检索器
    ///
    /// 空语料不会报错，只是之后所有查询都返回空结果
    pub fn build(chunks: Vec<ContentChunk>) -> Self {
        let entries = chunks
            .into_iter()
            .map(|chunk| {
                let tokens = tokenize(&format!("{} {}", chunk.source_section, chunk.text));
                RankEntry { chunk, tokens }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 语料中的全部 chunk（原始顺序）
    pub fn chunks(&self) -> impl Iterator<Item = &ContentChunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// 返回与查询最相关的 k 个 chunk
    pub fn rank(&self, query: &str, k: usize) -> Vec<ContentChunk> {
        self.rank_excluding(query, k, &HashSet::new())
    }

    /// 同 `rank`，但跳过 `exclude_ids` 中的 chunk
    pub fn rank_excluding(
        &self,
        query: &str,
        k: usize,
        exclude_ids: &HashSet<String>,
    ) -> Vec<ContentChunk> {
        self.rank_scored(query, k, exclude_ids)
            .into_iter()
            .map(|scored| scored.chunk.clone())
            .collect()
    }

    /// 带得分的排序结果
    pub fn rank_scored(
        &self,
        query: &str,
        k: usize,
        exclude_ids: &HashSet<String>,
    ) -> Vec<ScoredChunk<'_>> {
        let query_tokens = tokenize(query);

        let mut scored: Vec<ScoredChunk<'_>> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !exclude_ids.contains(&entry.chunk.id))
            .map(|(position, entry)| ScoredChunk {
                chunk: &entry.chunk,
                score: query_tokens
                    .iter()
                    .filter(|t| entry.tokens.contains(*t))
                    .count(),
                position,
            })
            .collect();

        // sort_by 是稳定排序，同分保持原始顺序
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(k);
        scored
    }

    /// 多个查询的结果并集，按 chunk id 去重并保留首次出现的顺序
    ///
    /// 每个查询最多贡献 k 个结果，总数不以 k 为上限
    pub fn rank_multi<S: AsRef<str>>(&self, queries: &[S], k: usize) -> Vec<ContentChunk> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();

        for query in queries {
            for scored in self.rank_scored(query.as_ref(), k, &HashSet::new()) {
                if seen.insert(scored.chunk.id.as_str()) {
                    results.push(scored.chunk.clone());
                }
            }
        }

        results
    }
}

/// 小写并按非字母数字字符切分
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

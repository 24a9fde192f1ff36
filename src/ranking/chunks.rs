//! 从论文内容构建检索语料

use crate::models::content::{slugify, ChunkKind, ContentChunk, ExtractedContent};

/// 章节正文在 chunk 中的最大字符数
const MAX_SECTION_CHARS: usize = 2000;
/// 最多纳入的参考文献数
const MAX_REFERENCES: usize = 30;

/// 把论文内容切成 chunk
///
/// 顺序固定：摘要 → 章节 → 公式说明 → 参考文献。空白章节被跳过。
pub fn build_chunks(content: &ExtractedContent) -> Vec<ContentChunk> {
    let base = format!("paper://{}", content.slug());
    let mut chunks = Vec::new();

    if !content.abstract_text.trim().is_empty() {
        chunks.push(ContentChunk::new(
            format!("{}/abstract", base),
            "Abstract",
            content.abstract_text.trim(),
            ChunkKind::Abstract,
        ));
    }

    for (idx, section) in content.sections.iter().enumerate() {
        let body = section.body.trim();
        if body.is_empty() {
            continue;
        }
        let text: String = body.chars().take(MAX_SECTION_CHARS).collect();
        chunks.push(ContentChunk::new(
            // 同名章节靠序号区分
            format!("{}/{}-{}", base, slugify(&section.title), idx),
            section.title.clone(),
            text,
            ChunkKind::Section,
        ));
    }

    for (idx, eq) in content.display_equations().enumerate() {
        let Some(description) = eq.description.as_deref().filter(|d| !d.trim().is_empty()) else {
            continue;
        };
        let label = eq.label.as_deref().unwrap_or(&eq.id);
        chunks.push(ContentChunk::new(
            format!("{}/equations/{}-{}", base, slugify(&eq.id), idx),
            eq.section.clone(),
            format!("{}: {}", label, description.trim()),
            ChunkKind::EquationDescription,
        ));
    }

    for (idx, reference) in content.references.iter().take(MAX_REFERENCES).enumerate() {
        if reference.text.trim().is_empty() {
            continue;
        }
        let ref_id = if reference.id.is_empty() {
            "ref".to_string()
        } else {
            slugify(&reference.id)
        };
        chunks.push(ContentChunk::new(
            // 参考文献 id 可能重复或全是符号
            format!("{}/references/{}-{}", base, ref_id, idx),
            "References",
            reference.text.trim(),
            ChunkKind::Reference,
        ));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{Equation, Reference, Section};

    fn sample() -> ExtractedContent {
        ExtractedContent {
            title: "Attention Is All You Need".to_string(),
            authors: vec!["Vaswani, A.".to_string()],
            abstract_text: "We propose the Transformer.".to_string(),
            sections: vec![
                Section {
                    title: "Introduction".to_string(),
                    body: "Recurrent networks dominate.".to_string(),
                    level: 1,
                },
                Section {
                    title: "Empty".to_string(),
                    body: "   ".to_string(),
                    level: 2,
                },
                Section {
                    title: "Methodology".to_string(),
                    body: "x".repeat(5000),
                    level: 1,
                },
            ],
            equations: vec![
                Equation {
                    id: "eq1".to_string(),
                    latex: "a=b".to_string(),
                    section: "Methodology".to_string(),
                    label: Some("eq:attention".to_string()),
                    description: Some("Scaled dot-product attention".to_string()),
                    ..Default::default()
                },
                Equation {
                    id: "eq2".to_string(),
                    latex: "x".to_string(),
                    is_inline: true,
                    description: Some("inline".to_string()),
                    ..Default::default()
                },
                Equation {
                    id: "eq3".to_string(),
                    latex: "y".to_string(),
                    description: None,
                    ..Default::default()
                },
            ],
            references: vec![Reference {
                id: "ref1".to_string(),
                text: "Bahdanau et al. 2015".to_string(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_chunk_kinds_and_order() {
        let chunks = build_chunks(&sample());
        let kinds: Vec<_> = chunks.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkKind::Abstract,
                ChunkKind::Section,
                ChunkKind::Section,
                ChunkKind::EquationDescription,
                ChunkKind::Reference,
            ]
        );
        assert_eq!(chunks[0].id, "paper://attention-is-all-you-need/abstract");
    }

    #[test]
    fn test_blank_sections_skipped_and_bodies_truncated() {
        let chunks = build_chunks(&sample());
        assert!(chunks.iter().all(|c| c.source_section != "Empty"));
        let method = chunks.iter().find(|c| c.source_section == "Methodology").unwrap();
        assert_eq!(method.text.chars().count(), MAX_SECTION_CHARS);
    }

    #[test]
    fn test_only_described_display_equations() {
        let chunks = build_chunks(&sample());
        let eqs: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::EquationDescription)
            .collect();
        assert_eq!(eqs.len(), 1);
        assert_eq!(eqs[0].text, "eq:attention: Scaled dot-product attention");
    }

    #[test]
    fn test_chunk_ids_are_unique() {
        let mut content = sample();
        content.sections.push(Section {
            title: "Introduction".to_string(),
            body: "Second intro.".to_string(),
            level: 1,
        });
        let chunks = build_chunks(&content);
        let ids: std::collections::HashSet<_> = chunks.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), chunks.len());
    }

    #[test]
    fn test_duplicate_reference_ids_are_all_retrievable() {
        let mut content = sample();
        content.references = vec![
            Reference {
                id: "[1]".to_string(),
                text: "Sutskever et al. sequence learning".to_string(),
                ..Default::default()
            },
            Reference {
                id: "[1]".to_string(),
                text: "Gehring et al. convolutional sequence learning".to_string(),
                ..Default::default()
            },
            Reference {
                id: "???".to_string(),
                text: "Kalchbrenner et al. sequence learning in linear time".to_string(),
                ..Default::default()
            },
        ];
        let chunks = build_chunks(&content);
        let refs: Vec<_> = chunks.iter().filter(|c| c.kind == ChunkKind::Reference).collect();
        let ids: std::collections::HashSet<_> = refs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 3);

        let ranker = crate::ranking::ContentRanker::build(chunks);
        let hits = ranker.rank_multi(&["sequence learning"], 10);
        assert_eq!(
            hits.iter().filter(|c| c.kind == ChunkKind::Reference).count(),
            3
        );
    }
}

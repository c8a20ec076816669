//! Query expansion and retrieval.

use crate::embeddings::EmbeddingProvider;
use crate::manager::IndexManager;
use crate::types::SearchHit;
use ragdex_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Maximum number of terms a single keyword group contributes.
pub const MAX_TERMS_PER_GROUP: usize = 5;

/// Welfare-domain synonyms, in matching order.
pub const KEYWORD_EXPANSION: &[(&str, &[&str])] = &[
    ("다자녀가정", &["다자녀", "셋째아이", "3자녀", "3명 이상", "많은 자녀"]),
    ("다자녀", &["다자녀가정", "셋째아이", "3자녀", "3명 이상"]),
    ("혜택", &["지원", "보조", "급여", "수당", "할인", "감면", "우대"]),
    ("지원", &["혜택", "보조", "급여", "수당", "지원금"]),
    ("임신", &["임산부", "예비맘", "산모", "임신부"]),
    ("출산", &["분만", "해산", "신생아", "산후조리"]),
    ("육아", &["양육", "자녀돌봄", "보육", "육아휴직"]),
    ("보육", &["어린이집", "유치원", "놀이방", "육아", "양육"]),
    ("한부모", &["한부모가정", "미혼모", "편부모", "조손가정"]),
];

/// Appends domain synonyms to a query before it is embedded.
///
/// Matching is a case-insensitive substring test against the original query.
/// A keyword hit contributes up to [`MAX_TERMS_PER_GROUP`] of its synonyms; a
/// synonym hit contributes the keyword followed by the remaining synonyms,
/// capped the same way. Terms the query already contains, or that an earlier
/// group already added, are skipped.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    groups: Vec<(String, Vec<String>)>,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new(
            KEYWORD_EXPANSION
                .iter()
                .map(|(keyword, synonyms)| {
                    (
                        keyword.to_string(),
                        synonyms.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }
}

impl QueryExpander {
    pub fn new(groups: Vec<(String, Vec<String>)>) -> Self {
        let groups = groups
            .into_iter()
            .map(|(keyword, synonyms)| {
                (
                    keyword.to_lowercase(),
                    synonyms.into_iter().map(|s| s.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { groups }
    }

    /// Candidate terms for one group, before de-duplication.
    fn group_terms<'a>(&'a self, query: &str, keyword: &'a str, synonyms: &'a [String]) -> Vec<&'a str> {
        if query.contains(keyword) {
            return synonyms
                .iter()
                .take(MAX_TERMS_PER_GROUP)
                .map(String::as_str)
                .collect();
        }

        match synonyms.iter().find(|s| query.contains(s.as_str())) {
            Some(hit) => std::iter::once(keyword)
                .chain(synonyms.iter().filter(|s| *s != hit).map(String::as_str))
                .take(MAX_TERMS_PER_GROUP)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Expand `query`. The result always starts with `query`.
    pub fn expand(&self, query: &str) -> String {
        let lowered = query.to_lowercase();
        let mut terms: Vec<&str> = Vec::new();

        for (keyword, synonyms) in &self.groups {
            for term in self.group_terms(&lowered, keyword, synonyms) {
                if !lowered.contains(term) && !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }

        if terms.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, terms.join(" "))
        }
    }
}

/// Answers queries against whatever index state is installed.
///
/// Never takes the ingestion lock, so searches run while a write is in
/// flight and see either the state before it or the state after it.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    manager: Arc<IndexManager>,
    embedder: Arc<dyn EmbeddingProvider>,
    expander: QueryExpander,
    threshold: f32,
}

impl QueryEngine {
    pub fn new(
        manager: Arc<IndexManager>,
        embedder: Arc<dyn EmbeddingProvider>,
        threshold: f32,
    ) -> Self {
        Self {
            manager,
            embedder,
            expander: QueryExpander::default(),
            threshold,
        }
    }

    /// Replace the default synonym table.
    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn expander(&self) -> &QueryExpander {
        &self.expander
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Up to `k` chunks scoring at least the threshold, best first.
    #[instrument(skip(self), fields(threshold = self.threshold))]
    pub async fn search(&self, query: &str, k: usize) -> AppResult<Vec<SearchHit>> {
        let state = self.manager.snapshot().ok_or_else(|| {
            AppError::EmbeddingUnavailable("no index loaded; ingest documents first".to_string())
        })?;

        if k == 0 || state.is_empty() {
            return Ok(Vec::new());
        }

        let expanded = self.expander.expand(query);
        debug!(expanded = %expanded, "Expanded query");

        let vector = self.embedder.embed(&expanded).await?;
        let neighbours = state.index().search(&vector, k)?;

        let hits: Vec<SearchHit> = neighbours
            .into_iter()
            .filter(|(score, _)| *score >= self.threshold)
            .filter_map(|(score, position)| {
                let meta = state.metas().get(position)?;
                let text = state.texts().get(position)?;
                Some(SearchHit {
                    text: text.clone(),
                    source: meta.source.clone(),
                    chunk_index: meta.chunk_index,
                    score,
                })
            })
            .collect();

        info!(
            results = hits.len(),
            top_score = hits.first().map(|h| h.score).unwrap_or(0.0),
            "Search completed"
        );

        Ok(hits)
    }
}

//! Paper records and the identifiers that point at them

use serde::{Deserialize, Serialize};

/// Internal surrogate key of a paper in the store
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PaperId(i64);

impl PaperId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for PaperId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PaperId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a paper by an outside catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExternalId {
    /// arXiv identifier, e.g. `2106.09685`
    Arxiv(String),
    /// Semantic Scholar paper id
    SemanticScholar(String),
}

impl ExternalId {
    pub fn as_str(&self) -> &str {
        match self {
            ExternalId::Arxiv(s) | ExternalId::SemanticScholar(s) => s,
        }
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalId::Arxiv(s) => write!(f, "arxiv:{}", s),
            ExternalId::SemanticScholar(s) => write!(f, "ss:{}", s),
        }
    }
}

/// Structured reference as returned by a bibliographic API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ss_paper_id: Option<String>,
}

/// One entry of a paper's citation list
///
/// Ingestion produces either bare arXiv ids or structured records; both
/// shapes deserialize into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCitation {
    ExternalId(String),
    Record(CitationRecord),
}

impl RawCitation {
    /// External ids this citation could match, in lookup priority order.
    pub fn candidates(&self) -> Vec<ExternalId> {
        match self {
            RawCitation::ExternalId(id) => non_blank(id)
                .map(|id| vec![ExternalId::Arxiv(id)])
                .unwrap_or_default(),
            RawCitation::Record(record) => {
                let mut ids = Vec::with_capacity(2);
                if let Some(id) = record.arxiv_id.as_deref().and_then(non_blank) {
                    ids.push(ExternalId::Arxiv(id));
                }
                if let Some(id) = record.ss_paper_id.as_deref().and_then(non_blank) {
                    ids.push(ExternalId::SemanticScholar(id));
                }
                ids
            }
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A paper as the graph engine sees it
///
/// `raw_citations`, `similarity_candidates`, `embedding` and
/// `cached_neighbor_ids` are filled in by different collaborators at
/// different times; `None` means "not populated yet".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: PaperId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ss_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_citations: Option<Vec<RawCitation>>,
    /// Rank-ordered by decreasing similarity
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_candidates"
    )]
    pub similarity_candidates: Option<Vec<PaperId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_candidates"
    )]
    pub cached_neighbor_ids: Option<Vec<PaperId>>,
}

impl Paper {
    pub fn new(id: impl Into<PaperId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_arxiv_id(mut self, arxiv_id: impl Into<String>) -> Self {
        self.arxiv_id = Some(arxiv_id.into());
        self
    }

    pub fn with_ss_id(mut self, ss_id: impl Into<String>) -> Self {
        self.ss_id = Some(ss_id.into());
        self
    }

    pub fn with_citations(mut self, citations: Vec<RawCitation>) -> Self {
        self.raw_citations = Some(citations);
        self
    }

    pub fn with_similarity_candidates(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.similarity_candidates = Some(ids.into_iter().map(PaperId::from).collect());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_cached_neighbors(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.cached_neighbor_ids = Some(ids.into_iter().map(PaperId::from).collect());
        self
    }

    /// External ids this paper is known under.
    pub fn external_ids(&self) -> Vec<ExternalId> {
        let mut ids = Vec::with_capacity(2);
        if let Some(id) = &self.arxiv_id {
            ids.push(ExternalId::Arxiv(id.clone()));
        }
        if let Some(id) = &self.ss_id {
            ids.push(ExternalId::SemanticScholar(id.clone()));
        }
        ids
    }

    /// True when the graph builder has something to derive edges from.
    pub fn has_graph_inputs(&self) -> bool {
        self.raw_citations.is_some() || self.similarity_candidates.is_some()
    }
}

/// Display record used when hydrating neighbor lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub id: PaperId,
    pub arxiv_id: Option<String>,
    pub title: String,
}

impl From<&Paper> for PaperSummary {
    fn from(paper: &Paper) -> Self {
        Self {
            id: paper.id,
            arxiv_id: paper.arxiv_id.clone(),
            title: paper.title.clone(),
        }
    }
}

/// Parse a loosely typed id list.
///
/// Accepts an array of integers or numeric strings, or a string holding such
/// an array as JSON. Elements that are not ids are skipped; anything that is
/// not a list yields an empty list.
pub fn parse_id_list(value: &serde_json::Value) -> Vec<PaperId> {
    use serde_json::Value;

    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ Value::Array(_)) => parse_id_list(&inner),
            _ => Vec::new(),
        },
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.is_finite())
                        .map(|f| f as i64)
                }),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            })
            .map(PaperId::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse a stored citation list, skipping entries of an unknown shape.
pub fn parse_citation_list(value: &serde_json::Value) -> Vec<RawCitation> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn deserialize_candidates<'de, D>(deserializer: D) -> Result<Option<Vec<PaperId>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Null => None,
        other => Some(parse_id_list(&other)),
    }))
}

//! Structural references ("section 2", "chapter 3", "p. 14", "§ 4.1").
//!
//! A reference found in the question is matched against chunk text as a
//! marker of the same kind and number. "section 2" matches "Section 2" and
//! "§2" but not "Section 21" or "Section 2.1". Page references also match the
//! chunk's page number. Matches are exact, so every hit has the same fixed
//! raw score.

use once_cell::sync::Lazy;
use regex::Regex;

use docqa_core::types::{Chunk, SearchCandidate, StrategyKind};
use docqa_core::{Error, Result};

use super::{QueryContext, RetrievalStrategy};

const REFERENCE_SCORE: f32 = 1.0;

static QUESTION_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b(chapter|chap|ch|section|sec|part|page|pg|p|lesson|unit|module|exercise|article|clause|appendix|step|table|figure|fig)\.?|(§))\s*(\d+(?:\.\d+)*)\b",
    )
    .expect("reference pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceKind {
    Chapter,
    Section,
    Part,
    Page,
    Lesson,
    Unit,
    Module,
    Exercise,
    Article,
    Clause,
    Appendix,
    Step,
    Table,
    Figure,
}

impl ReferenceKind {
    fn from_label(label: &str) -> Option<Self> {
        Some(match label.to_ascii_lowercase().as_str() {
            "chapter" | "chap" | "ch" => Self::Chapter,
            "section" | "sec" | "§" => Self::Section,
            "part" => Self::Part,
            "page" | "pg" | "p" => Self::Page,
            "lesson" => Self::Lesson,
            "unit" => Self::Unit,
            "module" => Self::Module,
            "exercise" => Self::Exercise,
            "article" => Self::Article,
            "clause" => Self::Clause,
            "appendix" => Self::Appendix,
            "step" => Self::Step,
            "table" => Self::Table,
            "figure" | "fig" => Self::Figure,
            _ => return None,
        })
    }

    /// Marker spellings accepted in document text.
    fn marker_pattern(self) -> &'static str {
        match self {
            Self::Chapter => r"\b(?:chapter|chap\.?|ch\.)",
            Self::Section => r"(?:\b(?:section|sec\.?)|§)",
            Self::Part => r"\bpart",
            Self::Page => r"\b(?:page|pg\.?|p\.)",
            Self::Lesson => r"\blesson",
            Self::Unit => r"\bunit",
            Self::Module => r"\bmodule",
            Self::Exercise => r"\bexercise",
            Self::Article => r"\barticle",
            Self::Clause => r"\bclause",
            Self::Appendix => r"\bappendix",
            Self::Step => r"\bstep",
            Self::Table => r"\btable",
            Self::Figure => r"\b(?:figure|fig\.?)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructuralReference {
    pub kind: ReferenceKind,
    /// Dotted decimal, e.g. `2` or `4.1`.
    pub number: String,
}

/// Every distinct structural reference in `question`, in order of appearance.
pub fn extract_references(question: &str) -> Vec<StructuralReference> {
    let mut refs: Vec<StructuralReference> = Vec::new();
    for caps in QUESTION_REFERENCE.captures_iter(question) {
        let label = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        let (Some(kind), Some(number)) = (ReferenceKind::from_label(label), caps.get(3)) else { continue };
        let reference = StructuralReference { kind, number: number.as_str().to_string() };
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }
    refs
}

struct Matcher {
    reference: StructuralReference,
    page: Option<u32>,
    marker: Regex,
}

impl Matcher {
    fn new(reference: StructuralReference) -> Result<Self> {
        let pattern = format!(r"(?i){}\s*{}", reference.kind.marker_pattern(), regex::escape(&reference.number));
        let marker = Regex::new(&pattern)
            .map_err(|e| Error::StrategyUnavailable { strategy: StrategyKind::Reference, reason: e.to_string() })?;
        let page = match reference.kind {
            ReferenceKind::Page => reference.number.parse().ok(),
            _ => None,
        };
        Ok(Self { reference, page, marker })
    }

    fn matches(&self, chunk: &Chunk) -> bool {
        if self.page.is_some() && chunk.page_number == self.page {
            return true;
        }
        self.marker.find_iter(&chunk.text).any(|m| ends_number(&chunk.text[m.end()..]))
    }
}

/// The marker's number must not continue: no further digit, letter, or
/// `.digit` sub-number right after it.
fn ends_number(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_alphanumeric() => false,
        Some('.') => !chars.next().is_some_and(|c| c.is_ascii_digit()),
        Some(_) => true,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceStrategy;

impl ReferenceStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for ReferenceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Reference
    }

    async fn search(&self, ctx: &QueryContext<'_>, k: usize) -> Result<Vec<SearchCandidate>> {
        let references = extract_references(ctx.question);
        if references.is_empty() {
            return Ok(Vec::new());
        }
        let matchers = references.into_iter().map(Matcher::new).collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            refs = ?matchers.iter().map(|m| &m.reference).collect::<Vec<_>>(),
            "structural references in question"
        );
        Ok(ctx
            .session
            .scan(k, |chunk| matchers.iter().any(|m| m.matches(chunk)))
            .iter()
            .filter_map(|c| ctx.session.candidate(&c.chunk_id, REFERENCE_SCORE, StrategyKind::Reference))
            .collect())
    }
}

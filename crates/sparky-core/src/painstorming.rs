//! Painstorming output → pains grouped by canonical buyer segment.
//!
//! Three stages: a regex preprocessing pass that retrofits segment headers
//! onto loosely formatted text, an extraction stage behind [`PainExtractor`]
//! (model-backed or local heuristic), and reconciliation of extracted segment
//! labels against the canonical list.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sparky_schema::{BuyerSegmentPainMap, Pain, PainType, RecordSource, OVERLAPPING_SEGMENT};

use crate::error::{PipelineError, PipelineResult};
use crate::gateway::ModelGateway;
use crate::json_extract::null_as_default;
use crate::prompts::PromptBuilder;
use crate::similarity::{closest_match, similarity};

static SEGMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*)?\s*(?:target\s+)?(?:buyer\s+)?segment(?:\s*#?\d+)?\s*(?::|\s[-–]\s)\s*(.+?)\s*$",
    )
    .expect("valid segment regex")
});

static HEADING_OR_BOLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#{1,6}\s*(.+?)\s*#*|\*\*(.+?)\*\*\s*:?)\s*$").expect("valid heading regex")
});

static PROBLEM_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*)?\s*[^\w\s]*\s*(functional|emotional|social|anticipated|fire)\s+(?:problems?|pains?)\b",
    )
    .expect("valid problem heading regex")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+(.+?)\s*$").expect("valid bullet regex")
});

static FIRE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:🔥|\(fire\)|\[fire\])\s*").expect("valid fire marker regex")
});

/// What to do with an extracted segment label that matches no canonical segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdHocSegmentPolicy {
    /// Keep as a new segment, leading symbols stripped and words capitalised.
    #[default]
    TitleCase,
    /// Keep as a new segment, leading symbols stripped, casing untouched.
    Keep,
    /// Drop the pains.
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    /// A fuzzy match is trusted only above this similarity.
    pub similarity_threshold: f64,
    pub ad_hoc: AdHocSegmentPolicy,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            ad_hoc: AdHocSegmentPolicy::TitleCase,
        }
    }
}

/// Extraction output before reconciliation, keyed by the raw segment label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPainExtraction {
    #[serde(default, deserialize_with = "null_as_default")]
    pub buyer_segment_pains: BTreeMap<String, Vec<RawPain>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overlapping_pains: Vec<RawPain>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPain {
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type", default)]
    pub pain_type: PainType,
    #[serde(default, alias = "fire", deserialize_with = "null_as_default")]
    pub is_fire: bool,
}

#[async_trait]
pub trait PainExtractor: Send + Sync {
    async fn extract(
        &self,
        structured_text: &str,
        canonical_segments: &[String],
    ) -> PipelineResult<RawPainExtraction>;
}

/// Asks the model to turn structured painstorming text into JSON.
pub struct ModelPainExtractor {
    gateway: Arc<ModelGateway>,
    prompts: PromptBuilder,
}

impl ModelPainExtractor {
    pub fn new(gateway: Arc<ModelGateway>, prompts: PromptBuilder) -> Self {
        Self { gateway, prompts }
    }
}

#[async_trait]
impl PainExtractor for ModelPainExtractor {
    async fn extract(
        &self,
        structured_text: &str,
        canonical_segments: &[String],
    ) -> PipelineResult<RawPainExtraction> {
        let spec = self
            .prompts
            .painstorming_extraction(structured_text, canonical_segments);
        self.gateway.complete_spec_structured(&spec).await
    }
}

/// Line-oriented extraction: segment headers, problem-type headings, FIRE
/// sections and bullet or numbered items.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPainExtractor;

impl HeuristicPainExtractor {
    pub fn extract_text(structured_text: &str, canonical_segments: &[String]) -> RawPainExtraction {
        let mut out = RawPainExtraction::default();
        let mut current: Option<String> = None;
        let mut current_type = PainType::Unknown;
        let mut fire_section = false;

        for line in structured_text.lines() {
            if let Some(label) = segment_header_label(line, canonical_segments) {
                current = Some(label);
                current_type = PainType::Unknown;
                fire_section = false;
                continue;
            }
            if is_overlap_heading(line) {
                current = None;
                current_type = PainType::Unknown;
                fire_section = false;
                continue;
            }
            if let Some(kind) = problem_heading(line) {
                match kind {
                    ProblemHeading::Fire => fire_section = true,
                    ProblemHeading::Type(t) => {
                        current_type = t;
                        fire_section = false;
                    }
                }
                continue;
            }

            let Some(item) = BULLET.captures(line).and_then(|c| c.get(1)) else {
                continue;
            };
            let marked_fire = FIRE_MARKER.is_match(item.as_str());
            let description = FIRE_MARKER.replace_all(item.as_str(), " ").trim().to_string();
            if description.is_empty() {
                continue;
            }

            let pain = RawPain {
                description,
                pain_type: if fire_section {
                    PainType::Unknown
                } else {
                    current_type
                },
                is_fire: fire_section || marked_fire,
            };
            match &current {
                Some(label) => out
                    .buyer_segment_pains
                    .entry(label.clone())
                    .or_default()
                    .push(pain),
                None => out.overlapping_pains.push(pain),
            }
        }

        out
    }
}

#[async_trait]
impl PainExtractor for HeuristicPainExtractor {
    async fn extract(
        &self,
        structured_text: &str,
        canonical_segments: &[String],
    ) -> PipelineResult<RawPainExtraction> {
        Ok(Self::extract_text(structured_text, canonical_segments))
    }
}

pub struct PainstormingParser {
    extractor: Arc<dyn PainExtractor>,
    policy: ReconcilePolicy,
}

impl PainstormingParser {
    pub fn new(extractor: Arc<dyn PainExtractor>, policy: ReconcilePolicy) -> Self {
        Self { extractor, policy }
    }

    pub fn heuristic(policy: ReconcilePolicy) -> Self {
        Self::new(Arc::new(HeuristicPainExtractor), policy)
    }

    /// Parses free-form painstorming text into pains keyed by canonical segment.
    ///
    /// Extraction failures surface as [`PipelineError::Parse`] with the input
    /// text attached; nothing is fabricated.
    pub async fn parse(
        &self,
        text: &str,
        canonical_segments: &[String],
    ) -> PipelineResult<BuyerSegmentPainMap> {
        if text.trim().is_empty() {
            return Ok(BuyerSegmentPainMap::new());
        }

        let structured = preprocess(text, canonical_segments, &self.policy);
        let raw = self
            .extractor
            .extract(&structured, canonical_segments)
            .await
            .map_err(|e| match e {
                PipelineError::Parse { .. } => e,
                other => PipelineError::parse(format!("pain extraction failed: {other}"), text),
            })?;

        let map = reconcile(raw, canonical_segments, &self.policy);
        tracing::debug!(
            segments = map.buyer_segment_pains.len(),
            overlapping = map.overlapping_pains.len(),
            "painstorming parsed"
        );
        Ok(map)
    }
}

/// Retrofits segment headers when the text has none for a canonical segment.
///
/// Segment labels are rewritten only when their similarity to the closest
/// canonical name is above `policy.similarity_threshold`.
pub fn preprocess(text: &str, canonical_segments: &[String], policy: &ReconcilePolicy) -> String {
    if canonical_segments.is_empty() || has_segment_header(text, canonical_segments) {
        return text.to_string();
    }

    // Fuzzy-match "Target Buyer Segment: ..." style labels onto canonical names.
    let mut rewritten = text.to_string();
    let labels: Vec<String> = text
        .lines()
        .filter_map(|line| SEGMENT_LINE.captures(line))
        .filter_map(|c| c.get(1).map(|m| clean_label(m.as_str())))
        .filter(|label| !label.is_empty())
        .collect();
    let has_segment_lines = !labels.is_empty();
    for label in labels {
        let Some(canonical) = closest_match(&label, canonical_segments) else {
            continue;
        };
        if canonical != label && similarity(&label, canonical) > policy.similarity_threshold {
            rewritten = rewritten.replace(&label, canonical);
        }
    }
    if has_segment_lines || has_segment_header(&rewritten, canonical_segments) {
        return rewritten;
    }

    // Promote lines that are nothing but a canonical segment name.
    let mut promoted = false;
    let lines: Vec<String> = rewritten
        .lines()
        .map(|line| match exact_segment(&strip_decoration(line), canonical_segments) {
            Some(segment) => {
                promoted = true;
                format!("## Target Buyer Segment: {segment}")
            }
            None => line.to_string(),
        })
        .collect();
    if promoted {
        return lines.join("\n");
    }

    synthesize_segment_sections(&rewritten, canonical_segments)
}

/// Last resort: problem-type sections with no segment structure at all are
/// grouped (a repeated problem type starts a new group) and zipped in order
/// against the canonical segments.
fn synthesize_segment_sections(text: &str, canonical_segments: &[String]) -> String {
    let mut out = Vec::new();
    let mut seen_in_group: Vec<ProblemHeading> = Vec::new();
    let mut segments = canonical_segments.iter();

    for line in text.lines() {
        if let Some(kind) = problem_heading(line) {
            let starts_group = seen_in_group.is_empty() || seen_in_group.contains(&kind);
            if starts_group {
                seen_in_group.clear();
                if let Some(segment) = segments.next() {
                    out.push(format!("## Target Buyer Segment: {segment}"));
                }
            }
            seen_in_group.push(kind);
        }
        out.push(line.to_string());
    }
    out.join("\n")
}

fn has_segment_header(text: &str, canonical_segments: &[String]) -> bool {
    text.lines().any(|line| {
        if let Some(label) = SEGMENT_LINE.captures(line).and_then(|c| c.get(1)) {
            if exact_segment(&clean_label(label.as_str()), canonical_segments).is_some() {
                return true;
            }
        }
        HEADING_OR_BOLD
            .captures(line)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .and_then(|m| exact_segment(&clean_label(m.as_str()), canonical_segments))
            .is_some()
    })
}

fn segment_header_label(line: &str, canonical_segments: &[String]) -> Option<String> {
    if problem_heading(line).is_some() {
        return None;
    }
    if let Some(label) = SEGMENT_LINE.captures(line).and_then(|c| c.get(1)) {
        let label = clean_label(label.as_str());
        if !label.is_empty() {
            return Some(label);
        }
    }
    let text = HEADING_OR_BOLD
        .captures(line)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))?;
    let label = clean_label(text.as_str());
    if label.is_empty() || is_overlap_label(&label) {
        return None;
    }
    match exact_segment(&label, canonical_segments) {
        Some(segment) => Some(segment.to_string()),
        None => Some(label),
    }
}

fn is_overlap_heading(line: &str) -> bool {
    HEADING_OR_BOLD
        .captures(line)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| is_overlap_label(m.as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProblemHeading {
    Type(PainType),
    Fire,
}

fn problem_heading(line: &str) -> Option<ProblemHeading> {
    if BULLET.is_match(line) && !line.trim_start().starts_with("**") {
        return None;
    }
    let kind = PROBLEM_HEADING.captures(line)?.get(1)?.as_str().to_lowercase();
    Some(if kind == "fire" {
        ProblemHeading::Fire
    } else {
        ProblemHeading::Type(PainType::from_label(&kind))
    })
}

fn exact_segment<'a>(label: &str, canonical_segments: &'a [String]) -> Option<&'a str> {
    let label = label.trim();
    canonical_segments
        .iter()
        .find(|s| s.trim().to_lowercase() == label.to_lowercase())
        .map(String::as_str)
}

fn is_overlap_label(label: &str) -> bool {
    let lower = label.trim().to_lowercase();
    lower.contains("overlap") || lower == "all segments"
}

/// Heading markers, bold, list numbering and a trailing colon removed.
fn strip_decoration(line: &str) -> String {
    let trimmed = line.trim().trim_start_matches('#').trim();
    let trimmed = trimmed.trim_matches('*').trim();
    let trimmed = trimmed.strip_suffix(':').unwrap_or(trimmed);
    trimmed.trim_matches('*').trim().to_string()
}

/// Leading emoji/symbols and a "Target Buyer Segment:" prefix removed.
fn clean_label(label: &str) -> String {
    let stripped = label.trim_start_matches(|c: char| !c.is_alphanumeric());
    let stripped = SEGMENT_LINE
        .captures(stripped)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(stripped);
    stripped
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim_end_matches(|c: char| c == '*' || c == ':' || c.is_whitespace())
        .to_string()
}

fn title_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut at_word_start = true;
    for ch in label.chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace() || ch == '-' || ch == '/';
    }
    out
}

fn slugify(segment: &str) -> String {
    let mut slug = String::with_capacity(segment.len());
    for ch in segment.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Maps a raw extracted label onto a bucket name; `None` drops the pains.
pub fn reconcile_label(
    label: &str,
    canonical_segments: &[String],
    policy: &ReconcilePolicy,
) -> Option<String> {
    let cleaned = clean_label(label);
    if cleaned.is_empty() {
        return Some(OVERLAPPING_SEGMENT.to_string());
    }
    if let Some(segment) = exact_segment(&cleaned, canonical_segments) {
        return Some(segment.to_string());
    }
    if is_overlap_label(&cleaned) {
        return Some(OVERLAPPING_SEGMENT.to_string());
    }
    if let Some(candidate) = closest_match(&cleaned, canonical_segments) {
        let score = similarity(&cleaned, candidate);
        if score > policy.similarity_threshold {
            return Some(candidate.to_string());
        }
        tracing::debug!(
            label = %cleaned,
            candidate,
            score,
            "segment label below similarity threshold"
        );
    }
    match policy.ad_hoc {
        AdHocSegmentPolicy::TitleCase => Some(title_case(&cleaned)),
        AdHocSegmentPolicy::Keep => Some(cleaned),
        AdHocSegmentPolicy::Discard => None,
    }
}

/// Reconciles labels, stamps ids, de-duplicates per bucket, then defaults
/// still-unknown types to functional.
pub fn reconcile(
    raw: RawPainExtraction,
    canonical_segments: &[String],
    policy: &ReconcilePolicy,
) -> BuyerSegmentPainMap {
    let timestamp = Utc::now().timestamp_millis();
    let mut map = BuyerSegmentPainMap::new();
    let mut index = 0usize;

    let labelled = raw
        .buyer_segment_pains
        .into_iter()
        .map(|(label, pains)| (reconcile_label(&label, canonical_segments, policy), label, pains))
        .chain(std::iter::once((
            Some(OVERLAPPING_SEGMENT.to_string()),
            OVERLAPPING_SEGMENT.to_string(),
            raw.overlapping_pains,
        )));

    for (target, label, pains) in labelled {
        let Some(segment) = target else {
            tracing::warn!(
                label = %label,
                count = pains.len(),
                "discarding pains for unmatched segment"
            );
            continue;
        };
        let slug = slugify(&segment);
        for pain in pains {
            let description = pain.description.trim();
            if description.is_empty() {
                tracing::debug!(segment = %segment, "dropping pain without description");
                continue;
            }
            let inserted = map.insert(Pain {
                id: format!("parsed_{slug}_{index}_{timestamp}"),
                description: description.to_string(),
                pain_type: pain.pain_type,
                is_fire: pain.is_fire,
                buyer_segment: segment.clone(),
                source: RecordSource::Assistant,
            });
            if inserted {
                index += 1;
            }
        }
    }

    for pain in map
        .buyer_segment_pains
        .values_mut()
        .flatten()
        .chain(map.overlapping_pains.iter_mut())
    {
        if pain.pain_type == PainType::Unknown {
            pain.pain_type = PainType::Functional;
        }
    }

    map
}

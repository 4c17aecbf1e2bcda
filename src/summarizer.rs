use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

use crate::model::SentimentResult;
use crate::sentiment::NoteSample;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AnalysisMode {
    /// Letter grade plus a short summary
    Grade,
    /// 0-100 score plus a short phrase
    Score,
}

impl AnalysisMode {
    /// Cache key for a window analyzed in this mode. Grades keep the bare
    /// window key so caches written before scores existed stay valid.
    pub fn cache_key(self, window_key: &str) -> String {
        match self {
            AnalysisMode::Grade => window_key.to_string(),
            AnalysisMode::Score => format!("{}-score", window_key),
        }
    }

    pub fn matches(self, result: &SentimentResult) -> bool {
        matches!(
            (result, self),
            (SentimentResult::Graded { .. }, AnalysisMode::Grade)
                | (SentimentResult::Scored { .. }, AnalysisMode::Score)
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SummarizeError {
    #[error("no summarizer configured (set ANTHROPIC_API_KEY or GOODDAYS_SENTIMENT_URL)")]
    NotConfigured,
    #[error("summarizer request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("summarizer returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("summarizer reply has unexpected shape: {0}")]
    UnexpectedShape(String),
}

pub trait Summarizer {
    fn analyze(
        &self,
        notes: &[NoteSample],
        mode: AnalysisMode,
    ) -> Result<SentimentResult, SummarizeError>;
}

pub fn build_prompt(notes: &[NoteSample], mode: AnalysisMode, period: &str) -> String {
    let journal = notes
        .iter()
        .map(|n| format!("{}: {}", n.date, n.note))
        .collect::<Vec<_>>()
        .join("\n\n");
    match mode {
        AnalysisMode::Grade => format!(
            r#"Analyze the following journal entries from {period} and provide:
1. A letter grade for the overall mood (A+, A, A-, B+, B, B-, C+, C, C-, D+, D, D-, F)
2. A brief evocative summary (2-3 sentences) that captures the overall vibe, themes, and emotional arc of this period

Journal entries:
{journal}

Respond in JSON format only:
{{"grade": "<letter>", "summary": "<string>"}}"#
        ),
        AnalysisMode::Score => format!(
            r#"Analyze the following journal entries from {period} and provide:
1. A sentiment score from 0-100 (0 = very negative, 50 = neutral, 100 = very positive)
2. A short evocative phrase (3-6 words) that captures the overall vibe/theme of the period

Journal entries:
{journal}

Respond in JSON format only:
{{"score": <number>, "phrase": "<string>"}}"#
        ),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn extract_field(text: &str, field: &str, quoted: bool) -> Option<String> {
    let value = if quoted { r#""([^"]+)""# } else { r"(-?[0-9]+(?:\.[0-9]+)?)" };
    let pattern = format!(r#""{}"\s*:\s*{}"#, field, value);
    let re = Regex::new(&pattern).ok()?;
    re.captures(text).map(|c| c[1].to_string())
}

/// Reads the model's reply in the shape `mode` asked for. A reply that is not
/// quite JSON is still accepted if both fields can be picked out of it.
pub fn parse_reply(text: &str, mode: AnalysisMode) -> Result<SentimentResult, SummarizeError> {
    let body = strip_code_fence(text);
    if let Ok(result) = serde_json::from_str::<SentimentResult>(body) {
        if mode.matches(&result) {
            return Ok(result);
        }
    }
    tracing::warn!("summarizer reply was not clean JSON, extracting fields");
    let fallback = match mode {
        AnalysisMode::Grade => extract_field(body, "grade", true)
            .zip(extract_field(body, "summary", true))
            .map(|(grade, summary)| SentimentResult::Graded { grade, summary }),
        AnalysisMode::Score => extract_field(body, "score", false)
            .and_then(|s| s.parse::<f64>().ok())
            .zip(extract_field(body, "phrase", true))
            .map(|(score, phrase)| SentimentResult::Scored { score, phrase }),
    };
    fallback.ok_or_else(|| SummarizeError::UnexpectedShape(body.chars().take(200).collect()))
}

/// Calls the Anthropic messages API directly.
pub struct AnthropicSummarizer {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    period: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicSummarizer {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        period: impl Into<String>,
    ) -> Result<Self, SummarizeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(AnthropicSummarizer {
            client,
            api_key: api_key.into(),
            model: model.into(),
            period: period.into(),
        })
    }
}

impl Summarizer for AnthropicSummarizer {
    fn analyze(
        &self,
        notes: &[NoteSample],
        mode: AnalysisMode,
    ) -> Result<SentimentResult, SummarizeError> {
        tracing::info!(model = %self.model, notes = notes.len(), "requesting mood summary");
        let response = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 512,
                "messages": [{
                    "role": "user",
                    "content": build_prompt(notes, mode, &self.period),
                }]
            }))
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(SummarizeError::Status { status, body });
        }

        let message: MessagesResponse = response.json()?;
        let text = message
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| SummarizeError::UnexpectedShape("no text block in reply".into()))?;
        parse_reply(&text, mode)
    }
}

/// Posts `{"notes": [...]}` to a sentiment endpoint that talks to the model
/// on our behalf.
pub struct ProxySummarizer {
    client: reqwest::blocking::Client,
    url: String,
}

impl ProxySummarizer {
    pub fn new(url: impl Into<String>) -> Result<Self, SummarizeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(ProxySummarizer {
            client,
            url: url.into(),
        })
    }
}

impl Summarizer for ProxySummarizer {
    fn analyze(
        &self,
        notes: &[NoteSample],
        mode: AnalysisMode,
    ) -> Result<SentimentResult, SummarizeError> {
        tracing::info!(url = %self.url, notes = notes.len(), "requesting mood summary via proxy");
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "notes": notes }))
            .send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(SummarizeError::Status { status, body });
        }
        let body = response.text()?;
        parse_reply(&body, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let result = parse_reply(r#"{"grade": "A-", "summary": "Bright."}"#, AnalysisMode::Grade);
        assert_eq!(
            result.unwrap(),
            SentimentResult::Graded {
                grade: "A-".into(),
                summary: "Bright.".into()
            }
        );
    }

    #[test]
    fn strips_markdown_fence() {
        let reply = "```json\n{\"score\": 64, \"phrase\": \"slow warm weeks\"}\n```";
        assert_eq!(
            parse_reply(reply, AnalysisMode::Score).unwrap(),
            SentimentResult::Scored {
                score: 64.0,
                phrase: "slow warm weeks".into()
            }
        );
    }

    #[test]
    fn falls_back_to_field_extraction() {
        let reply = r#"Sure! {"grade": "B", "summary": "Mixed but hopeful.", }"#;
        assert_eq!(
            parse_reply(reply, AnalysisMode::Grade).unwrap(),
            SentimentResult::Graded {
                grade: "B".into(),
                summary: "Mixed but hopeful.".into()
            }
        );
    }

    #[test]
    fn wrong_shape_is_an_error() {
        assert!(matches!(
            parse_reply(r#"{"mood": "fine"}"#, AnalysisMode::Grade),
            Err(SummarizeError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_reply(r#"{"grade": "A", "summary": "x"}"#, AnalysisMode::Score),
            Err(SummarizeError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn cache_keys_differ_by_mode() {
        assert_eq!(AnalysisMode::Grade.cache_key("last60"), "last60");
        assert_eq!(AnalysisMode::Score.cache_key("last60"), "last60-score");
        assert_eq!(AnalysisMode::Score.cache_key("2024-06"), "2024-06-score");

        let graded = SentimentResult::Graded {
            grade: "B".into(),
            summary: "Fine.".into(),
        };
        assert!(AnalysisMode::Grade.matches(&graded));
        assert!(!AnalysisMode::Score.matches(&graded));
    }

    #[test]
    fn prompt_lists_notes_and_expected_shape() {
        let notes = vec![
            NoteSample {
                date: "2024-06-01".into(),
                note: "beach".into(),
            },
            NoteSample {
                date: "2024-06-02".into(),
                note: "rain".into(),
            },
        ];
        let prompt = build_prompt(&notes, AnalysisMode::Score, "June 2024");
        assert!(prompt.contains("2024-06-01: beach\n\n2024-06-02: rain"));
        assert!(prompt.contains(r#"{"score": <number>, "phrase": "<string>"}"#));
        assert!(prompt.contains("from June 2024"));
    }
}

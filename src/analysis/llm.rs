//! LLM-backed analysis provider
//!
//! Two wire dialects are supported. Gemini gets the Google Search tool and a
//! response schema, and citations come from its grounding metadata. Anything
//! else is treated as an OpenAI-compatible chat endpoint asked for a JSON
//! object.

use super::{AnalysisProvider, AnalysisReport, SourceCitation};
use crate::config::LlmConfig;
use crate::error::{BotError, Result};
use crate::types::AssetClass;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GEMINI_MODEL: &str = "gemini-3-pro-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Gemini,
    OpenAi,
}

pub struct LlmAnalyst {
    config: LlmConfig,
    http: reqwest::Client,
    dialect: Dialect,
}

impl LlmAnalyst {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()?;
        let dialect = match config.provider.to_lowercase().as_str() {
            "gemini" | "google" => Dialect::Gemini,
            _ => Dialect::OpenAi,
        };
        Ok(Self { config, http, dialect })
    }

    fn prompt(symbol: &str, class: AssetClass) -> String {
        format!(
            "Perform an institutional-grade market analysis for {symbol} ({class}).\n\
             1. Search for the latest news, economic data and sentiment regarding {symbol}.\n\
             2. Judge whether overall sentiment is BULLISH, BEARISH or NEUTRAL.\n\
             3. Evaluate RSI and MACD.\n\
             4. Give a clear signal: BUY, SELL or HOLD.\n\
             5. Suggest stop-loss and take-profit distances in percent (suggestedSL, suggestedTP).\n\
             6. Write a rationale citing specific news or data points, and list the top 3 headlines.\n\
             Respond with a single JSON object with keys: signal, sentiment, confidence (0-100), \
             indicators {{rsi, macd}}, summary, suggestedSL, suggestedTP, headlines."
        )
    }

    async fn call_gemini(&self, prompt: &str) -> Result<AnalysisReport> {
        let base_url = self.config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
        let model = self.config.model.as_deref().unwrap_or(GEMINI_MODEL);

        let request = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "tools": [{"google_search": {}}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": report_schema(),
            }
        });

        let resp: Value = self
            .http
            .post(format!("{}/v1beta/models/{}:generateContent", base_url, model))
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_gemini_response(&resp)
    }

    async fn call_chat(&self, prompt: &str) -> Result<AnalysisReport> {
        let (base_url, model) = match self.config.provider.to_lowercase().as_str() {
            "deepseek" => (
                self.config.base_url.clone().unwrap_or_else(|| "https://api.deepseek.com".to_string()),
                self.config.model.clone().unwrap_or_else(|| "deepseek-chat".to_string()),
            ),
            "ollama" => (
                self.config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string()),
                self.config.model.clone().unwrap_or_else(|| "qwen2.5:14b".to_string()),
            ),
            _ => (
                self.config.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
                self.config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ),
        };

        let request = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"}
        });

        let mut req = self
            .http
            .post(format!("{}/v1/chat/completions", base_url))
            .header("content-type", "application/json");
        if !self.config.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let resp: Value = req.json(&request).send().await?.error_for_status()?.json().await?;
        parse_chat_response(&resp)
    }
}

#[async_trait]
impl AnalysisProvider for LlmAnalyst {
    async fn analyze(&self, symbol: &str, class: AssetClass) -> Result<AnalysisReport> {
        let prompt = Self::prompt(symbol, class);
        match self.dialect {
            Dialect::Gemini => self.call_gemini(&prompt).await,
            Dialect::OpenAi => self.call_chat(&prompt).await,
        }
    }

    fn name(&self) -> &str {
        &self.config.provider
    }
}

fn report_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "signal": {"type": "STRING", "description": "BUY, SELL, or HOLD"},
            "sentiment": {"type": "STRING", "description": "BULLISH, BEARISH, or NEUTRAL"},
            "confidence": {"type": "NUMBER", "description": "Percentage 0-100"},
            "indicators": {
                "type": "OBJECT",
                "properties": {
                    "rsi": {"type": "NUMBER"},
                    "macd": {"type": "STRING"}
                }
            },
            "summary": {"type": "STRING"},
            "suggestedSL": {"type": "NUMBER"},
            "suggestedTP": {"type": "NUMBER"},
            "headlines": {
                "type": "ARRAY",
                "items": {"type": "STRING"},
                "description": "Top 3 recent news headlines analyzed"
            }
        },
        "required": ["signal", "sentiment", "confidence", "summary", "headlines"]
    })
}

/// Slice from the first '{' to the last '}'; models like to wrap JSON in prose
pub(crate) fn extract_json(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Parse the report body. Inline `sources`/`citations` are lifted out first
/// since models return them in several shapes.
fn parse_report(text: &str) -> Result<(AnalysisReport, Vec<SourceCitation>)> {
    let mut raw: Value = serde_json::from_str(extract_json(text))
        .map_err(|e| BotError::Api(format!("Failed to parse analysis: {}", e)))?;

    let mut inline = Vec::new();
    if let Some(fields) = raw.as_object_mut() {
        for key in ["sources", "citations"] {
            if let Some(Value::Array(items)) = fields.remove(key) {
                inline.extend(items.iter().filter_map(citation));
            }
        }
    }

    let report = serde_json::from_value(raw)
        .map_err(|e| BotError::Api(format!("Failed to parse analysis: {}", e)))?;
    Ok((report, inline))
}

pub(crate) fn parse_gemini_response(resp: &Value) -> Result<AnalysisReport> {
    let candidate = &resp["candidates"][0];
    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(BotError::Api("Empty analysis response".into()));
    }

    let (mut report, _) = parse_report(&text)?;
    report.sources = candidate["groundingMetadata"]["groundingChunks"]
        .as_array()
        .map(|chunks| chunks.iter().filter_map(|c| citation(&c["web"])).collect())
        .unwrap_or_default();
    Ok(report)
}

pub(crate) fn parse_chat_response(resp: &Value) -> Result<AnalysisReport> {
    let text = resp["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| BotError::Api("Empty LLM response".into()))?;

    let (mut report, sources) = parse_report(text)?;
    report.sources = sources;
    Ok(report)
}

/// Accepts `{uri|url, title}` objects or bare URL strings
fn citation(value: &Value) -> Option<SourceCitation> {
    if let Some(uri) = value.as_str() {
        return Some(SourceCitation {
            uri: uri.to_string(),
            title: String::new(),
        });
    }
    let uri = value["uri"].as_str().or_else(|| value["url"].as_str())?;
    Some(SourceCitation {
        uri: uri.to_string(),
        title: value["title"].as_str().unwrap_or_default().to_string(),
    })
}

// src/ai.rs
//! HTTP-backed implementations of the clustering and idea-generation
//! boundaries (Chat Completions shape, bearer auth). The engine treats
//! both as opaque: any transport or shape problem surfaces as `Err` and
//! the pipeline substitutes an empty result.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::narrative::{BuildIdea, IdeaEnricher, Narrative, NarrativeClassifier, NarrativeDraft};
use crate::signals::types::Signal;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// How many signals the clustering prompt includes at most.
const PROMPT_SIGNAL_CAP: usize = 200;

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

pub struct AiClient {
    cfg: AiConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}

impl AiClient {
    pub fn new(cfg: AiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { cfg, http }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let req = ChatReq {
            model: &self.cfg.model,
            messages: vec![
                Msg { role: "system", content: system },
                Msg { role: "user", content: user },
            ],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post(&self.cfg.api_url)
            .bearer_auth(&self.cfg.api_key)
            .json(&req)
            .send()
            .await
            .context("ai request send")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("ai request failed with status {status}"));
        }
        let body: ChatResp = resp.json().await.context("ai response decode")?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("ai response had no choices"))
    }
}

/// Strip a markdown code fence if the model wrapped its JSON in one.
fn strip_fences(s: &str) -> &str {
    let t = s.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}

fn signal_digest(signals: &[Signal]) -> String {
    let mut lines = String::new();
    for s in signals.iter().take(PROMPT_SIGNAL_CAP) {
        lines.push_str(&format!(
            "- [{}/{}] {} | topics: {}\n",
            s.source.as_str(),
            s.sub_source,
            if s.title.is_empty() { &s.text } else { &s.title },
            s.topics.join(", ")
        ));
    }
    lines
}

const CLUSTER_SYSTEM: &str = "You cluster ecosystem activity signals into thematic narratives. \
Respond with ONLY a JSON array; each element: {\"id\",\"name\",\"description\",\
\"evidence\":[string],\"sources\":[string],\"topics\":[string],\
\"stage\":\"emerging|accelerating|maturing\",\"velocity\":\"rising|stable|declining\",\
\"confidence\":0..1}.";

const IDEAS_SYSTEM: &str = "You suggest small concrete build ideas for an ecosystem narrative. \
Respond with ONLY a JSON array; each element: {\"title\",\"description\"}. At most 3 items.";

#[async_trait]
impl NarrativeClassifier for AiClient {
    async fn classify(&self, signals: &[Signal]) -> Result<Vec<NarrativeDraft>> {
        let content = self
            .complete(CLUSTER_SYSTEM, &signal_digest(signals))
            .await?;
        serde_json::from_str(strip_fences(&content)).context("ai narratives decode")
    }
}

#[async_trait]
impl IdeaEnricher for AiClient {
    async fn ideas(&self, narrative: &Narrative) -> Result<Vec<BuildIdea>> {
        let user = format!(
            "Narrative: {}\nDescription: {}\nTopics: {}",
            narrative.name,
            narrative.description,
            narrative.topics.join(", ")
        );
        let content = self.complete(IDEAS_SYSTEM, &user).await?;
        serde_json::from_str(strip_fences(&content)).context("ai ideas decode")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_fences("[1]"), "[1]");
    }

    #[test]
    fn drafts_decode_from_fenced_content() {
        let content = "```json\n[{\"name\":\"DePIN\",\"stage\":\"emerging\"}]\n```";
        let drafts: Vec<NarrativeDraft> =
            serde_json::from_str(strip_fences(content)).expect("decode");
        assert_eq!(drafts[0].name, "DePIN");
    }
}

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::client::OpenAiClient;
use crate::pipeline::collaborators::ScriptGenerator;
use crate::pipeline::job::VideoStyle;
use crate::pipeline::script::{SLIDE_COUNT, Script, TARGET_DURATION_SECS};

const TEMPERATURE: f32 = 0.8;
const MAX_TOKENS: u32 = 2500;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Writes slide scripts with an OpenAI chat model.
pub struct OpenAiScriptGenerator {
    client: OpenAiClient,
    model: String,
}

impl OpenAiScriptGenerator {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ScriptGenerator for OpenAiScriptGenerator {
    async fn generate(&self, prompt: &str, style: VideoStyle) -> Result<Script> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(style),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Create a {} style video about: {}", style, prompt),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response: ChatResponse = self.client.post_json("chat/completions", &request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("Script model returned no content"))?;

        debug!(chars = content.len(), "Script model responded");
        parse_script(&content)
    }
}

/// Parse the model's reply, tolerating a markdown code fence around the JSON.
pub fn parse_script(raw: &str) -> Result<Script> {
    let body = strip_code_fences(raw);
    serde_json::from_str(body).context("Script model returned invalid JSON")
}

fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn style_instructions(style: VideoStyle) -> &'static str {
    match style {
        VideoStyle::Educational => {
            "Teach the topic clearly and thoroughly.\n\
             - Use facts, explanations and examples\n\
             - Break complex ideas into simple parts\n\
             - Each slide builds logically on the previous one\n\
             - Image prompts show diagrams, illustrations or visual representations of concepts"
        }
        VideoStyle::Storytelling => {
            "Tell a story with a clear beginning, middle and end.\n\
             - Build tension and emotional engagement\n\
             - Use vivid, sensory descriptions\n\
             - Each slide advances the plot\n\
             - Image prompts capture key story moments and emotions"
        }
        VideoStyle::Meme => {
            "Make a funny, internet-culture video that is relatable and shareable.\n\
             - Use modern internet humor and trending formats\n\
             - Be playful, ironic or absurd where it fits\n\
             - Each slide builds toward a punchline\n\
             - Image prompts are visually comedic, exaggerated or meme-style"
        }
    }
}

fn system_prompt(style: VideoStyle) -> String {
    let per_slide = TARGET_DURATION_SECS / SLIDE_COUNT as f64;
    format!(
        r#"You are an expert script writer for short-form video.
Write a compelling script for a {target:.0}-second video.

STYLE: {style}
{instructions}

STRUCTURE:
- Exactly {count} slides
- Each slide lasts about {per_slide:.0} seconds; the total must be between 58 and 62 seconds
- Every slide has:
  1. narration: the exact spoken text, conversational and natural when read aloud
  2. image_prompt: a detailed visual description for an image model (subject, setting, lighting, mood, composition, art style); no text in the image
  3. duration: seconds, typically 5.5 to 6.5

Keep narration short and punchy, around 150-180 words in total, flowing from one slide to the next.

Return ONLY valid JSON, no markdown:
{{
  "title": "Engaging title",
  "slides": [
    {{"narration": "...", "image_prompt": "...", "duration": 6.0}}
  ]
}}"#,
        target = TARGET_DURATION_SECS,
        style = style,
        instructions = style_instructions(style),
        count = SLIDE_COUNT,
        per_slide = per_slide,
    )
}

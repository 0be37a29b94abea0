use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use socialflow_common::{env_opt, env_or, env_or_string};
use std::{fmt::Write as _, time::Duration};

use crate::models::{BrandTone, Platform};

/// Prior captions included in a prompt.
pub const HISTORY_WINDOW: usize = 5;

const FAILURE_CAPTION: &str =
    "Something new is on the way. Stay tuned and tell us what you'd love to see next!";
const FAILURE_HASHTAGS: [&str; 3] = ["#comingsoon", "#staytuned", "#newpost"];

#[derive(Clone)]
pub struct CaptionConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

impl CaptionConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_opt("AI_API_KEY"),
            api_base: env_or_string("AI_API_BASE", "https://api.openai.com/v1"),
            model: env_or_string("AI_MODEL", "gpt-4o-mini"),
            timeout: Duration::from_secs(env_or("AI_TIMEOUT_SECS", 20u64)),
        }
    }
}

/// Everything the prompt is built from.
pub struct PromptInput<'a> {
    pub client_name: &'a str,
    pub client_description: Option<&'a str>,
    pub industry: Option<&'a str>,
    pub tone: BrandTone,
    pub platforms: &'a [Platform],
    pub topic: Option<&'a str>,
    pub image_description: Option<&'a str>,
    pub language: &'a str,
    pub previous_captions: &'a [String],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptionSource {
    Ai,
    Fallback,
}

impl CaptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionSource::Ai => "ai",
            CaptionSource::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedCaption {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub source: CaptionSource,
}

pub fn tone_adjectives(tone: BrandTone) -> &'static str {
    match tone {
        BrandTone::Professional => "polished, authoritative and credible",
        BrandTone::Casual => "relaxed, conversational and easygoing",
        BrandTone::Friendly => "warm, welcoming and approachable",
        BrandTone::Humorous => "witty, playful and light-hearted",
        BrandTone::Inspirational => "uplifting, motivating and hopeful",
        BrandTone::Luxurious => "elegant, refined and exclusive",
        BrandTone::Educational => "clear, informative and helpful",
    }
}

pub fn platform_hint(platform: Platform) -> &'static str {
    match platform {
        Platform::Instagram => {
            "visual storytelling, short punchy lines, a few emojis, hashtags at the end"
        }
        Platform::Facebook => {
            "conversational, end with a question that invites comments, light on hashtags"
        }
        Platform::Linkedin => {
            "professional insight, a clear takeaway, no emojis, 3 to 5 relevant hashtags"
        }
    }
}

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = String::new();

    let _ = write!(prompt, "You are a social media copywriter for {}", input.client_name);
    if let Some(industry) = non_blank(input.industry) {
        let _ = write!(prompt, ", a brand in the {industry} industry");
    }
    prompt.push_str(".\n");
    if let Some(description) = non_blank(input.client_description) {
        let _ = writeln!(prompt, "About the brand: {description}");
    }
    let _ = writeln!(
        prompt,
        "Brand voice: {} ({}).",
        tone_adjectives(input.tone),
        input.tone.as_str().to_ascii_lowercase()
    );

    let names: Vec<&str> = input.platforms.iter().map(|p| p.label()).collect();
    let _ = writeln!(prompt, "\nWrite one caption for: {}.", names.join(", "));
    prompt.push_str("Platform guidance:\n");
    for platform in input.platforms {
        let _ = writeln!(prompt, "- {}: {}", platform.label(), platform_hint(*platform));
    }

    prompt.push('\n');
    if let Some(topic) = non_blank(input.topic) {
        let _ = writeln!(prompt, "Topic: {topic}");
    }
    if let Some(image) = non_blank(input.image_description) {
        let _ = writeln!(prompt, "The post shows: {image}");
    }
    let _ = writeln!(prompt, "Write the caption in {}.", input.language);

    let previous: Vec<&String> = input
        .previous_captions
        .iter()
        .filter(|caption| !caption.trim().is_empty())
        .take(HISTORY_WINDOW)
        .collect();
    if !previous.is_empty() {
        prompt.push_str("\nDo not repeat or closely paraphrase any of these recent captions:\n");
        for (index, caption) in previous.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", index + 1, caption.trim());
        }
    }

    prompt.push_str(
        "\nRespond with only a JSON object of the form \
{\"caption\": \"...\", \"hashtags\": [\"#tag\"]} using 3 to 8 hashtags.",
    );
    prompt
}

/// Candidate captions and hashtags used when no generation key is configured.
pub fn fallback_candidates(tone: BrandTone) -> (&'static [&'static str], &'static [&'static str]) {
    match tone {
        BrandTone::Professional => (
            &[
                "Delivering results that matter. Discover how we help our partners grow.",
                "Excellence is a habit. Here's what we've been working on.",
                "Built on expertise, driven by quality. Learn more about our latest work.",
            ],
            &["#business", "#professional", "#growth", "#leadership"],
        ),
        BrandTone::Casual => (
            &[
                "Just another day doing what we love. Come hang out with us!",
                "No fuss, just good stuff. Check out what's new.",
                "Kicking back and sharing a little something with you today.",
            ],
            &["#goodvibes", "#everyday", "#chill", "#weekend"],
        ),
        BrandTone::Friendly => (
            &[
                "We're so glad you're here! Here's a little something we think you'll love.",
                "Hey friends! We've got something special to share with you today.",
                "Thanks for being part of our community. This one's for you!",
            ],
            &["#community", "#friends", "#together", "#welcome"],
        ),
        BrandTone::Humorous => (
            &[
                "We tried to think of a clever caption, but this post speaks for itself.",
                "Warning: this post may cause sudden urges to smile.",
                "Our coffee machine approved this post. That's all the validation we need.",
            ],
            &["#funny", "#mondaymood", "#lol", "#relatable"],
        ),
        BrandTone::Inspirational => (
            &[
                "Every big journey starts with a single step. Take yours today.",
                "Dream it, plan it, do it. Here's to chasing what matters.",
                "Small progress is still progress. Keep going.",
            ],
            &["#inspiration", "#motivation", "#goals", "#believe"],
        ),
        BrandTone::Luxurious => (
            &[
                "Crafted for those who appreciate the finer things.",
                "Timeless elegance, thoughtfully designed for you.",
                "Indulge in an experience made to be remembered.",
            ],
            &["#luxury", "#elegance", "#exclusive", "#finerthings"],
        ),
        BrandTone::Educational => (
            &[
                "Did you know? Here's a quick tip to help you get more out of every day.",
                "Learn something new today: a short guide from our team.",
                "Knowledge is better shared. Here's what we've learned recently.",
            ],
            &["#learning", "#tips", "#didyouknow", "#education"],
        ),
    }
}

/// Random caption from the tone's candidate list with the tone's hashtags.
pub fn fallback_caption(tone: BrandTone) -> GeneratedCaption {
    let (captions, hashtags) = fallback_candidates(tone);
    let caption = captions
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FAILURE_CAPTION);
    GeneratedCaption {
        caption: caption.to_string(),
        hashtags: hashtags.iter().map(|tag| tag.to_string()).collect(),
        source: CaptionSource::Fallback,
    }
}

fn failure_caption() -> GeneratedCaption {
    GeneratedCaption {
        caption: FAILURE_CAPTION.to_string(),
        hashtags: FAILURE_HASHTAGS.iter().map(|tag| tag.to_string()).collect(),
        source: CaptionSource::Fallback,
    }
}

/// Trim, add a leading `#`, strip inner spaces and drop duplicates (case-insensitive).
pub fn normalize_hashtags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let body: String = tag
            .as_ref()
            .trim()
            .trim_start_matches('#')
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if body.is_empty() {
            continue;
        }
        let tag = format!("#{body}");
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(&tag)) {
            out.push(tag);
        }
    }
    out
}

#[derive(Deserialize)]
struct GenerationPayload {
    caption: String,
    #[serde(default)]
    hashtags: Vec<String>,
}

/// Pull the JSON object out of a model reply, tolerating surrounding prose or code fences.
pub fn parse_generation(content: &str) -> Option<GeneratedCaption> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    let payload: GenerationPayload = serde_json::from_str(&content[start..=end]).ok()?;
    let caption = payload.caption.trim().to_string();
    if caption.is_empty() {
        return None;
    }
    Some(GeneratedCaption {
        caption,
        hashtags: normalize_hashtags(payload.hashtags),
        source: CaptionSource::Ai,
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct CaptionGenerator {
    config: CaptionConfig,
    client: Client,
}

impl CaptionGenerator {
    pub fn new(config: CaptionConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Never fails: missing keys and upstream errors both yield a fallback caption.
    pub async fn generate(&self, input: &PromptInput<'_>) -> GeneratedCaption {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return fallback_caption(input.tone);
        };

        let prompt = build_prompt(input);
        match self.request_completion(api_key, &prompt).await {
            Ok(Some(content)) => match parse_generation(&content) {
                Some(generated) => generated,
                None => {
                    tracing::warn!(
                        reply_len = content.len(),
                        "caption reply was not usable json"
                    );
                    failure_caption()
                }
            },
            Ok(None) => {
                tracing::warn!("caption reply had no content");
                failure_caption()
            }
            Err(err) => {
                tracing::error!(error = %err, model = self.config.model.as_str(), "caption generation failed");
                failure_caption()
            }
        }
    }

    async fn request_completion(
        &self,
        api_key: &str,
        prompt: &str,
    ) -> Result<Option<String>, reqwest::Error> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .timeout(self.config.timeout)
            .json(&ChatRequest {
                model: &self.config.model,
                temperature: 0.8,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: "You write engaging social media captions.",
                    },
                    ChatMessage {
                        role: "user",
                        content: prompt,
                    },
                ],
            })
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(status = response.status().as_u16(), "caption reply received");
        let reply: ChatResponse = response.json().await?;
        Ok(reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(platforms: &'a [Platform], previous: &'a [String]) -> PromptInput<'a> {
        PromptInput {
            client_name: "Acme Coffee",
            client_description: Some("Small-batch roastery"),
            industry: Some("food & beverage"),
            tone: BrandTone::Friendly,
            platforms,
            topic: Some("new autumn blend"),
            image_description: Some("a latte on a wooden table"),
            language: "Spanish",
            previous_captions: previous,
        }
    }

    #[test]
    fn prompt_carries_tone_platforms_and_language() {
        let platforms = [Platform::Instagram, Platform::Linkedin];
        let prompt = build_prompt(&input(&platforms, &[]));
        assert!(prompt.contains("Acme Coffee"));
        assert!(prompt.contains(tone_adjectives(BrandTone::Friendly)));
        assert!(prompt.contains(platform_hint(Platform::Instagram)));
        assert!(prompt.contains(platform_hint(Platform::Linkedin)));
        assert!(!prompt.contains(platform_hint(Platform::Facebook)));
        assert!(prompt.contains("Write the caption in Spanish."));
        assert!(prompt.contains("new autumn blend"));
        assert!(!prompt.contains("Do not repeat"));
    }

    #[test]
    fn prompt_lists_at_most_five_previous_captions() {
        let previous: Vec<String> = (1..=7).map(|n| format!("caption number {n}")).collect();
        let prompt = build_prompt(&input(&[Platform::Facebook], &previous));
        assert!(prompt.contains("Do not repeat"));
        assert!(prompt.contains("caption number 5"));
        assert!(!prompt.contains("caption number 6"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let previous = vec!["old one".to_string()];
        let platforms = [Platform::Facebook];
        assert_eq!(
            build_prompt(&input(&platforms, &previous)),
            build_prompt(&input(&platforms, &previous))
        );
    }

    #[test]
    fn professional_fallback_comes_from_professional_candidates() {
        let (captions, hashtags) = fallback_candidates(BrandTone::Professional);
        for _ in 0..25 {
            let generated = fallback_caption(BrandTone::Professional);
            assert!(captions.contains(&generated.caption.as_str()));
            assert_eq!(generated.hashtags, hashtags.to_vec());
            assert_eq!(generated.source, CaptionSource::Fallback);
        }
    }

    #[test]
    fn hashtags_are_normalized_and_deduplicated() {
        let tags = normalize_hashtags(["coffee", "#Coffee", "  #fresh roast ", "", "#"]);
        assert_eq!(tags, vec!["#coffee".to_string(), "#freshroast".to_string()]);
    }

    #[test]
    fn parses_json_wrapped_in_code_fence() {
        let reply = "```json\n{\"caption\": \"Fresh beans!\", \"hashtags\": [\"coffee\"]}\n```";
        let generated = parse_generation(reply).expect("parsed");
        assert_eq!(generated.caption, "Fresh beans!");
        assert_eq!(generated.hashtags, vec!["#coffee".to_string()]);
        assert_eq!(generated.source, CaptionSource::Ai);
        assert!(parse_generation("no json here").is_none());
        assert!(parse_generation("{\"caption\": \"  \"}").is_none());
    }

    #[tokio::test]
    async fn generator_without_key_uses_tone_fallback() {
        let generator = CaptionGenerator::new(CaptionConfig {
            api_key: None,
            api_base: "http://127.0.0.1:9".to_string(),
            model: "test".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert!(!generator.ai_enabled());
        let platforms = [Platform::Instagram];
        let generated = generator.generate(&input(&platforms, &[])).await;
        let (captions, _) = fallback_candidates(BrandTone::Friendly);
        assert!(captions.contains(&generated.caption.as_str()));
    }

    #[tokio::test]
    async fn unreachable_generator_degrades_to_fixed_caption() {
        let generator = CaptionGenerator::new(CaptionConfig {
            api_key: Some("key".to_string()),
            api_base: "http://127.0.0.1:9".to_string(),
            model: "test".to_string(),
            timeout: Duration::from_secs(1),
        });
        let platforms = [Platform::Instagram];
        let generated = generator.generate(&input(&platforms, &[])).await;
        assert_eq!(generated.caption, FAILURE_CAPTION);
        assert_eq!(generated.source, CaptionSource::Fallback);
    }

    #[test]
    fn chat_reply_content_is_extracted() {
        let reply: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"caption\":\"Hi\"}"}}]}"#,
        )
        .expect("decode");
        let content = reply.choices.into_iter().next().and_then(|choice| choice.message.content);
        assert_eq!(content.as_deref(), Some(r#"{"caption":"Hi"}"#));

        let empty: ChatResponse = serde_json::from_str("{}").expect("decode");
        assert!(empty.choices.is_empty());
    }
}

//! Text-to-speech for card sides.
//!
//! Synthesis is best effort: any failure leaves the card without audio.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::domain::Card;

/// Longest text the translate endpoint accepts per request
const MAX_CHUNK_CHARS: usize = 100;

/// Deadline for synthesizing one card side
pub const AUDIO_TIMEOUT: Duration = Duration::from_secs(10);

const TTS_URL: &str = "https://translate.google.com/translate_tts";

#[async_trait]
pub trait AudioSynthesizer: Send + Sync {
  /// MP3 bytes for `text` spoken in `lang`, or None on any failure.
  async fn synthesize(&self, text: &str, lang: &str) -> Option<Vec<u8>>;
}

/// Google Translate's public TTS endpoint (the one gTTS uses).
pub struct GoogleTranslateTts {
  http: Client,
  base_url: String,
}

impl GoogleTranslateTts {
  pub fn new() -> Self {
    let http = Client::builder()
      .timeout(AUDIO_TIMEOUT)
      .build()
      .unwrap_or_else(|e| {
        tracing::warn!("Falling back to default TTS client: {}", e);
        Client::new()
      });
    Self {
      http,
      base_url: TTS_URL.to_string(),
    }
  }

  fn chunk_url(&self, chunk: &str, lang: &str, index: usize, total: usize) -> String {
    format!(
      "{}?ie=UTF-8&q={}&tl={}&total={}&idx={}&textlen={}&client=tw-ob",
      self.base_url,
      urlencoding::encode(chunk),
      urlencoding::encode(lang),
      total,
      index,
      chunk.chars().count()
    )
  }

  async fn fetch(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let bytes = self
      .http
      .get(url)
      .send()
      .await?
      .error_for_status()?
      .bytes()
      .await?;
    Ok(bytes.to_vec())
  }
}

impl Default for GoogleTranslateTts {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl AudioSynthesizer for GoogleTranslateTts {
  async fn synthesize(&self, text: &str, lang: &str) -> Option<Vec<u8>> {
    let chunks = split_text(text, MAX_CHUNK_CHARS);
    if chunks.is_empty() {
      return None;
    }

    // MP3 frames concatenate cleanly
    let mut audio = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
      let url = self.chunk_url(chunk, lang, i, chunks.len());
      match self.fetch(&url).await {
        Ok(bytes) => audio.extend(bytes),
        Err(e) => {
          tracing::warn!("Failed to generate audio for '{}' ({}): {}", text, lang, e);
          return None;
        }
      }
    }
    Some(audio)
  }
}

/// Synthesizer that never produces audio
pub struct SilentSynthesizer;

#[async_trait]
impl AudioSynthesizer for SilentSynthesizer {
  async fn synthesize(&self, _text: &str, _lang: &str) -> Option<Vec<u8>> {
    None
  }
}

/// Split on whitespace into chunks of at most `max_chars`; overlong words are cut.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
  let mut chunks = Vec::new();
  let mut current = String::new();

  for word in text.split_whitespace() {
    let mut word: Vec<char> = word.chars().collect();
    while word.len() > max_chars {
      if !current.is_empty() {
        chunks.push(std::mem::take(&mut current));
      }
      chunks.push(word.drain(..max_chars).collect());
    }
    let word: String = word.into_iter().collect();
    if word.is_empty() {
      continue;
    }

    let needed = if current.is_empty() {
      word.chars().count()
    } else {
      current.chars().count() + 1 + word.chars().count()
    };
    if needed > max_chars {
      chunks.push(std::mem::take(&mut current));
    }
    if !current.is_empty() {
      current.push(' ');
    }
    current.push_str(&word);
  }

  if !current.is_empty() {
    chunks.push(current);
  }
  chunks
}

/// Synthesize with a deadline; a slow or hung synthesizer yields no audio.
pub async fn synthesize_within(
  tts: &dyn AudioSynthesizer,
  text: &str,
  lang: &str,
  deadline: Duration,
) -> Option<Vec<u8>> {
  match tokio::time::timeout(deadline, tts.synthesize(text, lang)).await {
    Ok(audio) => audio,
    Err(_) => {
      tracing::warn!("Audio for '{}' ({}) timed out after {:?}", text, lang, deadline);
      None
    }
  }
}

/// Fill in audio for both sides of a card.
pub async fn add_card_audio(card: &mut Card, tts: &dyn AudioSynthesizer, a_lang: &str, b_lang: &str) {
  card.a_audio = synthesize_within(tts, &card.a_content, a_lang, AUDIO_TIMEOUT).await;
  card.b_audio = synthesize_within(tts, &card.b_content, b_lang, AUDIO_TIMEOUT).await;
}

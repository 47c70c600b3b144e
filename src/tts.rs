//! Speech synthesis client.
//!
//! Posts normalized digest text to the Azure Speech REST endpoint as SSML
//! and returns MP3 bytes. The request is wrapped in the same [`RetryAsk`]
//! decorator the LLM client uses, so transient network and rate-limit
//! failures back off and retry instead of killing the run.
//!
//! Only text that has been through the normalizer should reach this module;
//! raw line feeds and tabs in the SSML body are read as pause directives by
//! the neural voices.

use crate::api::{AskAsync, RetryAsk};
use std::env;
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tracing::{info, instrument, warn};

const DEFAULT_REGION: &str = "westeurope";
const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Client for the Azure Speech REST API.
pub struct SpeechClient {
    http: reqwest::Client,
    subscription_key: String,
    region: String,
}

impl SpeechClient {
    /// Build a client from the environment: `AZURE_SPEECH_KEY` is required,
    /// `AZURE_SPEECH_REGION` defaults to `westeurope`. A missing key is a
    /// fatal configuration error caught before any scraping happens.
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let subscription_key = env::var("AZURE_SPEECH_KEY")
            .map_err(|_| "AZURE_SPEECH_KEY environment variable not set")?;
        let region = env::var("AZURE_SPEECH_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
        Ok(Self {
            http: reqwest::Client::new(),
            subscription_key,
            region,
        })
    }

    /// Synthesize `text` with `voice`, returning MP3 bytes. Retries with
    /// exponential backoff on failure.
    #[instrument(level = "info", skip_all, fields(voice = %voice, chars = text.chars().count()))]
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, Box<dyn Error>> {
        let t0 = Instant::now();
        let call = SpeechCall {
            client: self,
            voice,
        };
        let api = RetryAsk::new(call, 5, StdDuration::from_secs(1));
        let res = api.ask(text).await;
        match &res {
            Ok(bytes) => info!(
                bytes = bytes.len(),
                elapsed_ms = t0.elapsed().as_millis() as u128,
                "Speech synthesis succeeded"
            ),
            Err(e) => warn!(
                elapsed_ms = t0.elapsed().as_millis() as u128,
                error = %e,
                "Speech synthesis failed"
            ),
        }
        res
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        )
    }
}

impl fmt::Debug for SpeechClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechClient")
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug)]
struct SpeechCall<'a> {
    client: &'a SpeechClient,
    voice: &'a str,
}

impl AskAsync for SpeechCall<'_> {
    type Response = Vec<u8>;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let ssml = build_ssml(self.voice, text);
        let response = self
            .client
            .http
            .post(self.client.endpoint())
            .header("Ocp-Apim-Subscription-Key", &self.client.subscription_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", "audionews/1.0")
            .body(ssml)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("speech API error ({status}): {body}").into());
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

/// Build the SSML envelope for one synthesis request. The document language
/// comes from the voice identifier (`en-GB-SoniaNeural` speaks `en-GB`).
fn build_ssml(voice: &str, text: &str) -> String {
    let lang = voice_language(voice);
    format!(
        "<speak version='1.0' xml:lang='{}' xmlns='http://www.w3.org/2001/10/synthesis'>\
         <voice name='{}'>{}</voice></speak>",
        lang,
        voice,
        html_escape::encode_text(text)
    )
}

/// The `lang-REGION` prefix of a neural voice name.
fn voice_language(voice: &str) -> String {
    voice.split('-').take(2).collect::<Vec<_>>().join("-")
}

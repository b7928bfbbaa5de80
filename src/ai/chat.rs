use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{ChatCompletion, CompletionRequest, Source, ask};

const SYSTEM_PROMPT: &str = "You are a friendly weather assistant helping people plan outdoor events. \
    Answer questions about current conditions, forecasts, wet-weather risk and event planning concisely.";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub source: Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Weather,
    Risk,
    Prediction,
    Recommendation,
    General,
}

impl Topic {
    /// First keyword hit wins, in weather, risk, prediction, recommendation order.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        [
            ("weather", Self::Weather),
            ("risk", Self::Risk),
            ("prediction", Self::Prediction),
            ("recommendation", Self::Recommendation),
        ]
        .into_iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map_or(Self::General, |(_, topic)| topic)
    }

    fn responses(self) -> &'static [&'static str; 4] {
        match self {
            Self::Weather => &[
                "Based on current weather patterns, atmospheric conditions are showing significant variability. The combination of temperature, humidity and wind suggests we should monitor for potential changes.",
                "The current weather data indicates moderate conditions with typical seasonal variations. Keep an eye on precipitation probabilities and wind patterns for the next 24-48 hours.",
                "Weather analysis shows stable atmospheric pressure with normal temperature ranges. There are, however, signs of possible frontal activity that could bring changes in conditions.",
                "Current meteorological data suggests favorable conditions for most outdoor activities. Temperature and humidity are within comfortable ranges for the season.",
            ],
            Self::Risk => &[
                "Risk assessment indicates moderate levels for most weather factors. The primary concerns are precipitation probability and wind speed, which should be watched closely.",
                "Based on the weather parameters, the overall risk level is currently manageable. Temperatures are stable, but stay alert to rapid changes in atmospheric pressure.",
                "Weather risk analysis shows that current conditions pose minimal threat to planned activities. The main factors to consider are visibility and sudden changes.",
                "Risk evaluation suggests conditions are generally favorable. It is still prudent to keep contingency plans ready for weather-related surprises.",
            ],
            Self::Prediction => &[
                "Prediction models indicate a trend toward more stable conditions over the next few days. The probability of significant weather events remains low.",
                "Forecast analysis suggests typical seasonal patterns with minor variations. Temperatures show gradual warming with normal precipitation levels.",
                "Meteorological predictions point to continued stable conditions with occasional fluctuations and minimal disruption to outdoor plans.",
                "Forecasting models indicate current conditions will persist with gradual changes. No significant weather events are expected in the immediate period.",
            ],
            Self::Recommendation => &[
                "I recommend proceeding with planned activities while keeping an eye on the forecast. Conditions support most outdoor events, but have backup arrangements available.",
                "Based on the analysis, mid-day hours look most stable for your event. Keep contingency plans for weather-related changes.",
                "Monitor conditions closely and be ready to adjust schedules if needed. The outlook is generally positive for most activities.",
                "Keep checking for weather updates and hold flexible plans. Conditions appear favorable, but weather can change rapidly.",
            ],
            Self::General => &[
                "I'm here to help with weather questions. I can describe current conditions, predictions, risk assessments and recommendations for your activities.",
                "As your weather assistant, I can analyze conditions, provide forecasts, assess risks and suggest how to plan outdoor events.",
                "I specialize in weather analysis. Ask me about current conditions, forecasts, risk assessments or recommendations for your plans.",
                "I can help with current conditions, predictions, risk analysis and planning recommendations for your activities.",
            ],
        }
    }
}

pub fn canned_reply<R: Rng + ?Sized>(message: &str, rng: &mut R) -> String {
    let responses = Topic::classify(message).responses();
    responses.choose(rng).copied().unwrap_or(responses[0]).to_string()
}

pub async fn reply<R: Rng + Send + ?Sized>(
    backend: Option<&dyn ChatCompletion>,
    message: &str,
    rng: &mut R,
) -> ChatResponse {
    let request = CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt: message.to_string(),
        temperature: 0.7,
        max_tokens: 500,
    };
    match ask(backend, request, "chat").await {
        Some(reply) => ChatResponse { reply, source: Source::Ai },
        None => ChatResponse { reply: canned_reply(message, rng), source: Source::Fallback },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::stub::StubCompletion;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn keyword_order_decides_topic() {
        assert_eq!(Topic::classify("What's the WEATHER risk?"), Topic::Weather);
        assert_eq!(Topic::classify("risk and prediction"), Topic::Risk);
        assert_eq!(Topic::classify("any prediction?"), Topic::Prediction);
        assert_eq!(Topic::classify("Recommendation please"), Topic::Recommendation);
        assert_eq!(Topic::classify("hello"), Topic::General);
    }

    #[test]
    fn canned_reply_comes_from_topic_pool() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..20 {
            let reply = canned_reply("risk?", &mut rng);
            assert!(Topic::Risk.responses().contains(&reply.as_str()));
        }
    }

    #[tokio::test]
    async fn backend_reply_is_passed_through() {
        let backend = StubCompletion::replying("Bring an umbrella.");
        let mut rng = StdRng::seed_from_u64(0);
        let resp = reply(Some(&backend), "will it rain?", &mut rng).await;
        assert_eq!(resp.reply, "Bring an umbrella.");
        assert_eq!(resp.source, Source::Ai);
        assert_eq!(backend.seen.lock().unwrap()[0].prompt, "will it rain?");
    }

    #[tokio::test]
    async fn no_backend_uses_canned_reply() {
        let mut rng = StdRng::seed_from_u64(0);
        let resp = reply(None, "hello there", &mut rng).await;
        assert_eq!(resp.source, Source::Fallback);
        assert!(Topic::General.responses().contains(&resp.reply.as_str()));
    }
}

//! Prompt templates and parsing of the one-word answers they ask for.

use crate::face::FaceEmotion;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FALLBACK_REPLY: &str = "I'm here for you.";

/// Asks the model for a short supportive reply to what the user said.
pub fn empathy_prompt(user_text: &str, emotion: &str) -> String {
    format!(
        "The user said or expressed: \"{user_text}\".\n\
         Detected emotion: {emotion}.\n\
         Respond briefly, empathetically, and supportively."
    )
}

/// Trims the model reply; an empty reply becomes [`FALLBACK_REPLY`].
pub fn normalize_reply(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        FALLBACK_REPLY.to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Happy,
    Sad,
    Angry,
    Stressed,
    Depressed,
    Carefree,
    Emotional,
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 8] = [
        Sentiment::Happy,
        Sentiment::Sad,
        Sentiment::Angry,
        Sentiment::Stressed,
        Sentiment::Depressed,
        Sentiment::Carefree,
        Sentiment::Emotional,
        Sentiment::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Happy => "Happy",
            Sentiment::Sad => "Sad",
            Sentiment::Angry => "Angry",
            Sentiment::Stressed => "Stressed",
            Sentiment::Depressed => "Depressed",
            Sentiment::Carefree => "Carefree",
            Sentiment::Emotional => "Emotional",
            Sentiment::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn sentiment_prompt(text: &str) -> String {
    format!(
        "Analyze the sentiment of the following text and categorize it as a single emotion \
         from this list: Happy, Sad, Angry, Stressed, Depressed, Carefree, Emotional, or Neutral. \
         Provide only the emotion word. \
         Text: \"{text}\""
    )
}

/// Reads the first word of a reply; anything off-list maps to `Neutral`.
pub fn parse_sentiment(reply: &str) -> Sentiment {
    let word = first_word(reply);
    Sentiment::ALL
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(&word))
        .unwrap_or_else(|| {
            tracing::debug!(reply, "unrecognised sentiment, using Neutral");
            Sentiment::Neutral
        })
}

pub fn face_prompt() -> String {
    let labels: Vec<&str> = FaceEmotion::ALL.iter().map(FaceEmotion::as_str).collect();
    format!(
        "Look at the most prominent human face in this image and classify its facial \
         expression as a single emotion from this list: {}. \
         If no face is visible, answer neutral. Provide only the emotion word.",
        labels.join(", ")
    )
}

/// Face labels accept a few common synonyms the model likes to use.
pub fn parse_face_emotion(reply: &str) -> FaceEmotion {
    let word = first_word(reply);
    let parsed = match word.as_str() {
        "angry" | "anger" => Some(FaceEmotion::Angry),
        "disgust" | "disgusted" => Some(FaceEmotion::Disgust),
        "fear" | "fearful" | "scared" => Some(FaceEmotion::Fear),
        "happy" | "happiness" | "joy" => Some(FaceEmotion::Happy),
        "sad" | "sadness" => Some(FaceEmotion::Sad),
        "surprise" | "surprised" => Some(FaceEmotion::Surprise),
        "neutral" => Some(FaceEmotion::Neutral),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        tracing::debug!(reply, "unrecognised face emotion, using neutral");
        FaceEmotion::Neutral
    })
}

fn first_word(reply: &str) -> String {
    reply
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

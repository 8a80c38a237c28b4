//! System prompts describing each category's reply schema.

use crate::category::{ContentCategory, MediaKind};

use super::EngineRequest;

const NEWS: &str = r#"You are a professional fact-checking engine. Audit the given news content or claim and respond with one JSON object:
{
  "verdict": "Credible | Mostly True | Questionable | Likely False | False",
  "credibilityScore": 0-100,
  "globalAuthorityScore": 0-100,
  "summary": "3-5 sentence analysis",
  "claimsAnalyzed": ["each claim identified"],
  "flaggedClaims": ["claims that appear false or misleading"],
  "sources": ["source references"],
  "motiveAnalysis": {"primaryMotive": "Inform | Persuade | Mislead | Entertain | Sell", "confidenceLevel": 0-100},
  "sentimentSummary": "1-2 sentence summary of public reaction"
}
If the claim cannot be verified, say so in the verdict and keep the score low."#;

const TOOL: &str = r#"You are a professional cybersecurity and software auditor. Audit the given tool, website or software and respond with one JSON object:
{
  "toolName": "name of the tool",
  "safetyRating": "use ONLY: AAA+++ | AA+ | A | B | D | F",
  "legitimacy": "Official Software | Verified Publisher | Unknown Publisher | Suspicious | Malicious",
  "userTrust": "Very High | High | Moderate | Low | Very Low",
  "riskLevel": "Minimal | Low | Medium | High | Critical",
  "globalAuthorityScore": 0-100,
  "details": "audit summary",
  "recommendations": ["list"],
  "flags": ["list"],
  "privacyAudit": "Excellent | Good | Fair | Poor | Critical, with a brief explanation",
  "resultAccuracy": 0-100
}"#;

const MEDIA: &str = r#"You are a professional media forensics engine. Perform a forensic scan of the given MEDIA_KIND and respond with one JSON object:
{
  "mediaName": "brief title of the media",
  "mediaType": "MEDIA_KIND",
  "forensicScore": 0-100,
  "verdict": "AUTHENTIC | LIKELY_AUTHENTIC | INCONCLUSIVE | LIKELY_MANIPULATED | MANIPULATED | SYNTHETIC",
  "authenticityProbability": 0-100,
  "aiDetection": {"isAiGenerated": true or false, "confidence": 0-100, "model": "detected model or N/A"},
  "tamperCheck": {"isTampered": true or false, "regions": ["suspicious regions"]},
  "flags": ["list"],
  "recommendations": ["list"]
}
When the evidence is inconclusive, lean toward manipulation rather than authenticity."#;

const AUDIO: &str = r#"You are an audio forensics and transcription engine. The source platform is PLATFORM. Respond with one JSON object:
{
  "audioTitle": "brief descriptive title",
  "platform": "PLATFORM",
  "transcription": "speech-to-text transcription with speaker labels",
  "smartSummary": "3-5 sentence summary",
  "voiceAudit": {
    "verdict": "HUMAN | AI_GENERATED | MIXED | INCONCLUSIVE",
    "confidence": 0-100,
    "detectedModel": "suspected voice model or N/A",
    "naturalness": 0-100,
    "breathingPatterns": "NATURAL | ABSENT | ARTIFICIAL",
    "microExpressions": "PRESENT | ABSENT | SYNTHETIC",
    "pitchVariation": "NATURAL | MONOTONE | ARTIFICIAL_VARIATION",
    "finding": "one sentence explaining the voice audit"
  },
  "languageAnalysis": {"primaryLanguage": "language", "confidence": 0-100},
  "audioQuality": {"overallScore": 0-100},
  "riskAssessment": "SAFE | LOW_RISK | MEDIUM_RISK | HIGH_RISK",
  "flags": ["list"],
  "recommendations": ["list"]
}
Never mark inconclusive audio as HUMAN; default to AI_GENERATED and explain the doubt."#;

/// System prompt for a request.
pub fn system_prompt(request: &EngineRequest) -> String {
    match request.category {
        ContentCategory::News => NEWS.to_string(),
        ContentCategory::Tool => TOOL.to_string(),
        ContentCategory::Media => {
            MEDIA.replace("MEDIA_KIND", request.hint().unwrap_or(MediaKind::Image.as_str()))
        }
        ContentCategory::Audio => AUDIO.replace(
            "PLATFORM",
            request
                .platform
                .as_deref()
                .unwrap_or(crate::classify::DIRECT_UPLOAD),
        ),
    }
}

/// User message carrying the content.
pub fn user_message(request: &EngineRequest) -> String {
    let action = match request.category {
        ContentCategory::News => "Fact-check the following",
        ContentCategory::Tool => "Audit the following",
        ContentCategory::Media => "Run a forensic scan on the following",
        ContentCategory::Audio => "Analyze the following audio source",
    };
    format!("{}:\n\n{}", action, request.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_prompt_carries_kind() {
        let mut req = EngineRequest::new(ContentCategory::Media, "https://x.org/a.mp4");
        req.media_kind = Some(MediaKind::Video);
        let prompt = system_prompt(&req);
        assert!(prompt.contains("\"mediaType\": \"video\""));
        assert!(!prompt.contains("MEDIA_KIND"));
    }

    #[test]
    fn test_audio_prompt_carries_platform() {
        let mut req = EngineRequest::new(ContentCategory::Audio, "https://youtu.be/x");
        req.platform = Some("YouTube".to_string());
        assert!(system_prompt(&req).contains("The source platform is YouTube."));

        let req = EngineRequest::new(ContentCategory::Audio, "memo");
        assert!(system_prompt(&req).contains("Direct Upload"));
    }

    #[test]
    fn test_user_message_contains_content() {
        let req = EngineRequest::new(ContentCategory::News, "Vaccines cause magnetism");
        assert!(user_message(&req).ends_with("Vaccines cause magnetism"));
    }
}

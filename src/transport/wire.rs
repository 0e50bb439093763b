//! JSON shapes of the `generateContent` API.

use serde::{Deserialize, Serialize};

use crate::prompt::ComposedPrompt;

/// Request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    system_instruction: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> From<&'a ComposedPrompt> for GenerateContentRequest<'a> {
    fn from(prompt: &'a ComposedPrompt) -> Self {
        Self {
            contents: [Content {
                parts: [Part {
                    text: &prompt.user_message,
                }],
            }],
            system_instruction: Content {
                parts: [Part {
                    text: &prompt.system_instruction,
                }],
            },
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Option<Vec<PartResponse>>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
///
/// Returns `None` if the body is not JSON or any step of the path is missing.
pub fn extract_text(body: &str) -> Option<String> {
    let parsed: GenerateContentResponse = serde_json::from_str(body).ok()?;
    parsed
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts?
        .into_iter()
        .next()?
        .text
}

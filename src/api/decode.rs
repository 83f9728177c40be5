//! Normalization of provider payloads into [`Chunk`] and [`ImageResponse`].
//!
//! Nothing past this module inspects raw response JSON.

use base64::Engine as _;

use super::{Candidate, GenerateContentResponse, GroundingSource};
use crate::core::message::{Chunk, GroundingCitation, ImagePayload};
use crate::providers::{ImageResponse, ProviderError};

const DEFAULT_MAP_TITLE: &str = "Location";

/// Decode one streamed response into a chunk.
///
/// Only the first candidate is considered. Text is the concatenation of its
/// non-thought text parts; grounding sources without a URI are dropped.
pub fn decode_chunk(response: &GenerateContentResponse) -> Chunk {
    let Some(candidate) = response.candidates.first() else {
        return Chunk::default();
    };

    Chunk {
        text: candidate_text(candidate),
        citations: candidate_citations(candidate),
    }
}

fn candidate_text(candidate: &Candidate) -> String {
    candidate
        .content
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter(|part| part.thought != Some(true))
        .filter_map(|part| part.text.as_deref())
        .collect()
}

fn candidate_citations(candidate: &Candidate) -> Vec<GroundingCitation> {
    let Some(metadata) = &candidate.grounding_metadata else {
        return Vec::new();
    };

    let mut citations = Vec::new();
    for chunk in &metadata.grounding_chunks {
        if let Some((uri, title)) = chunk.web.as_ref().and_then(source_fields) {
            let title = title.unwrap_or_else(|| uri.clone());
            citations.push(GroundingCitation::web(uri, title));
        }
        if let Some((uri, title)) = chunk.maps.as_ref().and_then(source_fields) {
            let title = title.unwrap_or_else(|| DEFAULT_MAP_TITLE.to_string());
            citations.push(GroundingCitation::map(uri, title));
        }
    }
    citations
}

fn source_fields(source: &GroundingSource) -> Option<(String, Option<String>)> {
    let uri = source.uri.as_deref().map(str::trim).filter(|uri| !uri.is_empty())?;
    let title = source
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string);
    Some((uri.to_string(), title))
}

/// Decode a single-shot image response into text parts and image payloads.
pub fn decode_image_response(
    response: &GenerateContentResponse,
) -> Result<ImageResponse, ProviderError> {
    let mut decoded = ImageResponse::default();
    let parts = response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| content.parts.as_slice())
        .unwrap_or_default();

    for part in parts {
        if let Some(inline) = &part.inline_data {
            let data = base64::engine::general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|err| ProviderError::new(format!("invalid image payload: {err}")))?;
            decoded
                .images
                .push(ImagePayload::new(inline.mime_type.clone(), data));
        }
        if let Some(text) = &part.text {
            decoded.text_parts.push(text.clone());
        }
    }

    Ok(decoded)
}

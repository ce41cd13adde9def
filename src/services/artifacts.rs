//! Printable QR cards pointing guests at the entry URL of their section.

use qrcode::{QrCode, render::svg};
use thiserror::Error;
use url::Url;

use crate::state::game::Section;

/// Query parameter carrying the unlock code on entry URLs.
pub const CODE_PARAM: &str = "code";

const QR_MIN_DIMENSION: u32 = 250;
const QR_DARK: &str = "#44403c";
const QR_LIGHT: &str = "#ffffff";

/// One QR card for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareableArtifact {
    /// Section the card reveals.
    pub section_id: u32,
    /// Unlock code carried by the card.
    pub code: String,
    /// URL encoded in the QR image.
    pub target_url: String,
    /// Standalone SVG document.
    pub svg: String,
}

/// Why a QR card could not be produced.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The base URL does not parse.
    #[error("invalid base url `{url}`: {source}")]
    InvalidBaseUrl {
        /// URL as supplied.
        url: String,
        /// Underlying error.
        #[source]
        source: url::ParseError,
    },
    /// The base URL is not http or https.
    #[error("base url `{url}` must use http or https")]
    UnsupportedScheme {
        /// URL as supplied.
        url: String,
    },
    /// The code does not fit in a QR symbol.
    #[error("failed to encode QR for section {section_id}: {source}")]
    Encode {
        /// Section the card belongs to.
        section_id: u32,
        /// Underlying error.
        #[source]
        source: qrcode::types::QrError,
    },
}

/// Build `<base without query or fragment>?code=<code>`.
pub fn entry_url(base: &Url, code: &str) -> Url {
    let mut target = base.clone();
    target.set_fragment(None);
    target.set_query(None);
    target.query_pairs_mut().append_pair(CODE_PARAM, code);
    target
}

/// Parse and check the base URL guests will land on.
pub fn parse_base_url(raw: &str) -> Result<Url, ArtifactError> {
    let url = Url::parse(raw.trim()).map_err(|source| ArtifactError::InvalidBaseUrl {
        /// URL as supplied.
        url: raw.to_owned(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ArtifactError::UnsupportedScheme {
            url: raw.to_owned(),
        }),
    }
}

/// Render the QR card of every section. Same inputs, same output.
pub fn generate_shareable_artifacts(
    sections: &[Section],
    base_url: &Url,
) -> Result<Vec<ShareableArtifact>, ArtifactError> {
    sections
        .iter()
        .map(|section| render_artifact(section, base_url))
        .collect()
}

/// Render the QR card of a single section.
pub fn render_artifact(section: &Section, base_url: &Url) -> Result<ShareableArtifact, ArtifactError> {
    let target = entry_url(base_url, &section.code);
    let code = QrCode::new(target.as_str().as_bytes()).map_err(|source| ArtifactError::Encode {
        /// Section the card belongs to.
        section_id: section.id,
        source,
    })?;
    let svg = code
        .render::<svg::Color>()
        .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
        .dark_color(svg::Color(QR_DARK))
        .light_color(svg::Color(QR_LIGHT))
        .quiet_zone(true)
        .build();

    Ok(ShareableArtifact {
        /// Section the card belongs to.
        section_id: section.id,
        code: section.code.clone(),
        target_url: target.into(),
        svg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: u32, code: &str) -> Section {
        Section {
            id,
            code: code.into(),
            is_unlocked: false,
            row: 0,
            col: id,
        }
    }

    #[test]
    fn entry_url_replaces_query_and_fragment() {
        let base = parse_base_url("https://party.example/reveal?code=OLD&x=1#top").unwrap();
        assert_eq!(
            entry_url(&base, "WED-ABCDE").as_str(),
            "https://party.example/reveal?code=WED-ABCDE"
        );
    }

    #[test]
    fn non_http_base_is_rejected() {
        assert!(matches!(
            parse_base_url("ftp://party.example/"),
            Err(ArtifactError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ArtifactError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn artifacts_are_deterministic_svg_per_section() {
        let base = parse_base_url("http://localhost:8080/").unwrap();
        let sections = [section(0, "WED-AAAAA"), section(1, "WED-BBBBB")];

        let first = generate_shareable_artifacts(&sections, &base).unwrap();
        let second = generate_shareable_artifacts(&sections, &base).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);

        let card = &first[1];
        assert_eq!(card.section_id, 1);
        assert_eq!(card.target_url, "http://localhost:8080/?code=WED-BBBBB");
        assert!(card.svg.contains("<svg"));
        assert!(card.svg.contains(QR_DARK));
        assert_ne!(first[0].svg, first[1].svg);
    }
}

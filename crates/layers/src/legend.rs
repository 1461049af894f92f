//! Legend descriptors attached to tree leaves.
//!
//! A leaf carries exactly one legend shape:
//! - a single symbol, rendered inline next to the checkbox
//! - several symbols, rendered as a list below the leaf
//! - one server-rendered composite image
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/png";

/// Query parameters owned by a legend request; existing values are replaced.
const LEGEND_REQUEST_PARAMS: [&str; 4] = ["service", "request", "format", "layer"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegendError {
    InvalidImageData(String),
}

impl std::fmt::Display for LegendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegendError::InvalidImageData(msg) => write!(f, "invalid inline legend image: {msg}"),
        }
    }
}

impl std::error::Error for LegendError {}

/// One legend symbol: an image reference plus an optional label.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, alias = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Base64 image payload, preferred over `image_url` when present.
    #[serde(default, alias = "imageData", skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, alias = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl LegendEntry {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Source suitable for an image element: a data URI for inline images,
    /// otherwise the image URL.
    pub fn image_src(&self) -> Option<String> {
        if let Some(data) = &self.image_data {
            let content_type = self
                .content_type
                .as_deref()
                .unwrap_or(DEFAULT_IMAGE_CONTENT_TYPE);
            return Some(format!("data:{content_type};base64,{data}"));
        }
        self.image_url.clone()
    }

    pub fn decode_image(&self) -> Result<Option<Vec<u8>>, LegendError> {
        let Some(data) = &self.image_data else {
            return Ok(None);
        };
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map(Some)
            .map_err(|e| LegendError::InvalidImageData(e.to_string()))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LegendShape {
    Single,
    Multi,
    LargeImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Legend {
    Single { entry: LegendEntry },
    Multi { entries: Vec<LegendEntry> },
    LargeImage { url: String },
}

impl Legend {
    /// Classifies an ordered list of entries. Empty lists carry no legend.
    pub fn from_entries(mut entries: Vec<LegendEntry>) -> Option<Legend> {
        match entries.len() {
            0 => None,
            1 => entries.pop().map(|entry| Legend::Single { entry }),
            _ => Some(Legend::Multi { entries }),
        }
    }

    pub fn shape(&self) -> LegendShape {
        match self {
            Legend::Single { .. } => LegendShape::Single,
            Legend::Multi { .. } => LegendShape::Multi,
            Legend::LargeImage { .. } => LegendShape::LargeImage,
        }
    }

    /// Symbol entries as a sequence; a single legend is a one-entry sequence
    /// and a large image has none.
    pub fn entries(&self) -> &[LegendEntry] {
        match self {
            Legend::Single { entry } => std::slice::from_ref(entry),
            Legend::Multi { entries } => entries,
            Legend::LargeImage { .. } => &[],
        }
    }

    /// Multi-entry and large-image legends are shown in an expandable area
    /// below the leaf instead of inline.
    pub fn is_expandable(&self) -> bool {
        !matches!(self, Legend::Single { .. })
    }
}

/// Caller-supplied legend, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegendInput {
    LargeImage {
        #[serde(alias = "largeImageUrl")]
        large_image_url: String,
    },
    Entries(Vec<LegendEntry>),
    Url(String),
    Entry(LegendEntry),
}

impl LegendInput {
    pub fn classify(self) -> Option<Legend> {
        match self {
            LegendInput::LargeImage { large_image_url } => Some(Legend::LargeImage {
                url: large_image_url,
            }),
            LegendInput::Entries(entries) => Legend::from_entries(entries),
            LegendInput::Url(url) => Some(Legend::Single {
                entry: LegendEntry::from_url(url),
            }),
            LegendInput::Entry(entry) => Some(Legend::Single { entry }),
        }
    }
}

/// Builds a WMS `GetLegendGraphic` request URL for `selector` on `service_url`.
///
/// Unrelated query parameters of the service URL are kept.
pub fn wms_legend_url(service_url: &str, selector: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(service_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            !LEGEND_REQUEST_PARAMS
                .iter()
                .any(|p| k.eq_ignore_ascii_case(p))
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        query.extend_pairs(&kept);
        query
            .append_pair("service", "WMS")
            .append_pair("request", "GetLegendGraphic")
            .append_pair("format", "image/png")
            .append_pair("layer", selector);
    }
    Ok(url.into())
}

use serde::{Deserialize, Serialize};

use crate::legend::{Legend, wms_legend_url};

/// Identity of a concrete layer object owned by the host map.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u64);

pub trait Layer {
    fn id(&self) -> LayerId;
}

/// A plain map layer (tiles, WMS, vector...) that the host map shows or hides
/// as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLayer {
    id: LayerId,
    /// Service endpoint, when the layer is backed by one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// WMS `layers` selector sent with legend requests.
    #[serde(default, alias = "wmsLayers", skip_serializing_if = "Option::is_none")]
    pub wms_layers: Option<String>,
}

impl MapLayer {
    pub fn new(id: u64) -> Self {
        Self {
            id: LayerId(id),
            url: None,
            wms_layers: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_wms_layers(mut self, layers: impl Into<String>) -> Self {
        self.wms_layers = Some(layers.into());
        self
    }

    /// Legend synthesized from the layer's service URL, if it has one.
    ///
    /// The URL follows the WMS `GetLegendGraphic` convention and is exposed as
    /// a large-image legend. Any absolute URL qualifies, so a tile template such
    /// as `https://tile.example.com/{z}/{x}/{y}.png` still gets a WMS legend
    /// URL the tile server will not answer. Only relative URLs are skipped.
    pub fn synthesized_legend(&self) -> Option<Legend> {
        let url = self.url.as_deref()?;
        let selector = self.wms_layers.as_deref().unwrap_or("");
        match wms_legend_url(url, selector) {
            Ok(url) => Some(Legend::LargeImage { url }),
            Err(err) => {
                tracing::warn!("layer {:?}: no legend for unparsable url {url:?}: {err}", self.id);
                None
            }
        }
    }
}

impl Layer for MapLayer {
    fn id(&self) -> LayerId {
        self.id
    }
}

/// How metadata requests against a map service authenticate.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Credentials {
    #[default]
    Anonymous,
    /// Access token appended to every request.
    Token { token: String },
    /// Session cookie forwarded with every request.
    Forward { cookie: String },
}

/// A remote map service layer whose sub-layers are switched server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLayer {
    id: LayerId,
    pub url: String,
    #[serde(default)]
    pub credentials: Credentials,
}

impl ServiceLayer {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id: LayerId(id),
            url: url.into(),
            credentials: Credentials::Anonymous,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Service root without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

impl Layer for ServiceLayer {
    fn id(&self) -> LayerId {
        self.id
    }
}

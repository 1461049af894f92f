//! Map-service metadata: payload types and the fetch abstraction.
//!
//! Normalizing a service registration needs two independent reads against
//! the service root: the sub-layer hierarchy and the legend description.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use foundation::SubLayerId;
use layers::{LegendEntry, ServiceLayer};
use serde::{Deserialize, Serialize};

/// Error type for metadata fetches.
#[derive(Debug)]
pub struct FetchError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Sub-layer hierarchy reported by a service root.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(default)]
    pub layers: Vec<SubLayerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubLayerInfo {
    pub id: SubLayerId,
    #[serde(default)]
    pub name: String,
    /// `-1` for top-level sub-layers.
    #[serde(default = "top_level")]
    pub parent_layer_id: SubLayerId,
    #[serde(default)]
    pub sub_layer_ids: Option<Vec<SubLayerId>>,
}

fn top_level() -> SubLayerId {
    SubLayerId::NONE
}

impl SubLayerInfo {
    pub fn leaf(id: i64, name: impl Into<String>, parent: i64) -> Self {
        Self {
            id: SubLayerId(id),
            name: name.into(),
            parent_layer_id: SubLayerId(parent),
            sub_layer_ids: None,
        }
    }

    pub fn group(
        id: i64,
        name: impl Into<String>,
        parent: i64,
        children: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            sub_layer_ids: Some(children.into_iter().map(SubLayerId).collect()),
            ..Self::leaf(id, name, parent)
        }
    }

    pub fn is_group(&self) -> bool {
        self.sub_layer_ids.as_ref().is_some_and(|ids| !ids.is_empty())
    }
}

/// Legend description reported by a service root.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLegend {
    #[serde(default)]
    pub layers: Vec<LayerLegend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerLegend {
    pub layer_id: SubLayerId,
    #[serde(default)]
    pub layer_name: Option<String>,
    #[serde(default)]
    pub legend: Vec<ServiceLegendEntry>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLegendEntry {
    #[serde(default)]
    pub label: String,
    /// Usually relative to `<service>/<layerId>/images/`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl ServiceLegendEntry {
    pub fn to_legend_entry(&self, service_url: &str, layer: SubLayerId) -> LegendEntry {
        let image_url = self.url.as_deref().map(|u| {
            if url::Url::parse(u).is_ok() {
                u.to_string()
            } else {
                format!(
                    "{}/{layer}/images/{}",
                    service_url.trim_end_matches('/'),
                    u.trim_start_matches('/')
                )
            }
        });
        LegendEntry {
            label: (!self.label.is_empty()).then(|| self.label.clone()),
            image_url,
            image_data: self.image_data.clone(),
            content_type: self.content_type.clone(),
        }
    }
}

impl ServiceLegend {
    /// Legend entries per sub-layer, with image URLs resolved against `service_url`.
    pub fn entries_by_layer(&self, service_url: &str) -> HashMap<SubLayerId, Vec<LegendEntry>> {
        self.layers
            .iter()
            .map(|l| {
                let entries = l
                    .legend
                    .iter()
                    .map(|e| e.to_legend_entry(service_url, l.layer_id))
                    .collect();
                (l.layer_id, entries)
            })
            .collect()
    }
}

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reads map-service metadata.
///
/// Methods return boxed futures for dyn-compatibility.
pub trait ServiceMetadataClient: Send + Sync {
    fn fetch_info<'a>(
        &'a self,
        service: &'a ServiceLayer,
    ) -> BoxFuture<'a, Result<ServiceInfo, FetchError>>;

    fn fetch_legend<'a>(
        &'a self,
        service: &'a ServiceLayer,
    ) -> BoxFuture<'a, Result<ServiceLegend, FetchError>>;
}

#[derive(Debug, Clone)]
struct ServiceFixture {
    info: Result<ServiceInfo, String>,
    legend: Result<ServiceLegend, String>,
}

/// Serves fixed metadata keyed by service URL.
#[derive(Debug, Default)]
pub struct InMemoryMetadataClient {
    services: HashMap<String, ServiceFixture>,
}

impl InMemoryMetadataClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, info: ServiceInfo, legend: ServiceLegend) {
        self.services.insert(
            normalize_key(&url.into()),
            ServiceFixture {
                info: Ok(info),
                legend: Ok(legend),
            },
        );
    }

    pub fn fail_info(&mut self, url: impl Into<String>, message: impl Into<String>) {
        self.fixture_mut(url).info = Err(message.into());
    }

    pub fn fail_legend(&mut self, url: impl Into<String>, message: impl Into<String>) {
        self.fixture_mut(url).legend = Err(message.into());
    }

    fn fixture_mut(&mut self, url: impl Into<String>) -> &mut ServiceFixture {
        self.services
            .entry(normalize_key(&url.into()))
            .or_insert_with(|| ServiceFixture {
                info: Ok(ServiceInfo::default()),
                legend: Ok(ServiceLegend::default()),
            })
    }

    fn lookup(&self, service: &ServiceLayer) -> Result<&ServiceFixture, FetchError> {
        self.services
            .get(service.base_url())
            .ok_or_else(|| FetchError::new(format!("no metadata for {}", service.base_url())))
    }
}

fn normalize_key(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

impl ServiceMetadataClient for InMemoryMetadataClient {
    fn fetch_info<'a>(
        &'a self,
        service: &'a ServiceLayer,
    ) -> BoxFuture<'a, Result<ServiceInfo, FetchError>> {
        let result = self
            .lookup(service)
            .and_then(|f| f.info.clone().map_err(FetchError::new));
        Box::pin(std::future::ready(result))
    }

    fn fetch_legend<'a>(
        &'a self,
        service: &'a ServiceLayer,
    ) -> BoxFuture<'a, Result<ServiceLegend, FetchError>> {
        let result = self
            .lookup(service)
            .and_then(|f| f.legend.clone().map_err(FetchError::new));
        Box::pin(std::future::ready(result))
    }
}

use foundation::SubLayerId;
use layers::{LegendInput, MapLayer, ServiceLayer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    ServiceDynamic,
    ServiceFeature,
    Static,
}

impl std::fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationKind::ServiceDynamic => write!(f, "service-dynamic"),
            RegistrationKind::ServiceFeature => write!(f, "service-feature"),
            RegistrationKind::Static => write!(f, "static"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    EmptyName { kind: RegistrationKind },
    EmptyServiceUrl { name: String },
    /// A static entry without children must carry a layer handle.
    MissingLayer { name: String },
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationError::EmptyName { kind } => write!(f, "{kind} registration has no name"),
            RegistrationError::EmptyServiceUrl { name } => {
                write!(f, "service registration {name:?} has no url")
            }
            RegistrationError::MissingLayer { name } => {
                write!(f, "static entry {name:?} has neither children nor a layer")
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// One caller-declared layer or layer group, keyed by `"type"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LayerRegistration {
    ServiceDynamic(ServiceRegistration),
    ServiceFeature(ServiceRegistration),
    Static(StaticRegistration),
}

impl LayerRegistration {
    pub fn kind(&self) -> RegistrationKind {
        match self {
            LayerRegistration::ServiceDynamic(_) => RegistrationKind::ServiceDynamic,
            LayerRegistration::ServiceFeature(_) => RegistrationKind::ServiceFeature,
            LayerRegistration::Static(_) => RegistrationKind::Static,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LayerRegistration::ServiceDynamic(s) | LayerRegistration::ServiceFeature(s) => &s.name,
            LayerRegistration::Static(s) => &s.name,
        }
    }

    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.name().trim().is_empty() {
            return Err(RegistrationError::EmptyName { kind: self.kind() });
        }
        match self {
            LayerRegistration::ServiceDynamic(s) | LayerRegistration::ServiceFeature(s) => {
                if s.layer.url.trim().is_empty() {
                    return Err(RegistrationError::EmptyServiceUrl {
                        name: s.name.clone(),
                    });
                }
                Ok(())
            }
            LayerRegistration::Static(s) => s.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub name: String,
    pub layer: ServiceLayer,
    /// Sub-layers active when the registration is added.
    #[serde(default, alias = "visibleLayers")]
    pub visible_layers: Vec<SubLayerId>,
    /// When set, only these sub-layers appear in the tree at all.
    #[serde(default, alias = "subLayersList", skip_serializing_if = "Option::is_none")]
    pub sublayer_allow_list: Option<Vec<SubLayerId>>,
    /// Start with every listed sub-layer active.
    #[serde(default, alias = "allVisible")]
    pub all_visible: bool,
}

impl ServiceRegistration {
    pub fn new(name: impl Into<String>, layer: ServiceLayer) -> Self {
        Self {
            name: name.into(),
            layer,
            visible_layers: Vec::new(),
            sublayer_allow_list: None,
            all_visible: false,
        }
    }

    pub fn with_visible_layers(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.visible_layers = ids.into_iter().map(SubLayerId).collect();
        self
    }

    pub fn with_allow_list(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.sublayer_allow_list = Some(ids.into_iter().map(SubLayerId).collect());
        self
    }

    pub fn with_all_visible(mut self) -> Self {
        self.all_visible = true;
        self
    }
}

/// A caller-described layer or nested group of plain map layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRegistration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<MapLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<StaticRegistration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<LegendInput>,
    /// Initial visibility.
    #[serde(default)]
    pub enabled: bool,
}

impl StaticRegistration {
    pub fn leaf(name: impl Into<String>, layer: MapLayer) -> Self {
        Self {
            name: name.into(),
            layer: Some(layer),
            children: None,
            legend: None,
            enabled: false,
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<StaticRegistration>) -> Self {
        Self {
            name: name.into(),
            layer: None,
            children: Some(children),
            legend: None,
            enabled: false,
        }
    }

    pub fn with_legend(mut self, legend: LegendInput) -> Self {
        self.legend = Some(legend);
        self
    }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    fn validate(&self) -> Result<(), RegistrationError> {
        if self.name.trim().is_empty() {
            return Err(RegistrationError::EmptyName {
                kind: RegistrationKind::Static,
            });
        }
        match &self.children {
            Some(children) => children.iter().try_for_each(StaticRegistration::validate),
            None if self.layer.is_none() => Err(RegistrationError::MissingLayer {
                name: self.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerRegistration, RegistrationError, RegistrationKind, StaticRegistration};
    use foundation::SubLayerId;
    use layers::MapLayer;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_tagged_registrations() {
        let json = r#"[
            {"type": "service-dynamic", "name": "Census",
             "layer": {"id": 1, "url": "https://host/arcgis/rest/services/Census/MapServer"},
             "visibleLayers": [2, 3], "allVisible": false},
            {"type": "static", "name": "Base", "layer": {"id": 2, "url": "https://host/wms", "wms_layers": "roads"}},
            {"type": "static", "name": "Group", "children": [
                {"name": "A", "layer": {"id": 3}, "enabled": true},
                {"name": "B", "layer": {"id": 4}, "legend": "https://host/b.png"}
            ]}
        ]"#;
        let regs: Vec<LayerRegistration> = serde_json::from_str(json).unwrap();
        assert_eq!(regs.len(), 3);
        assert_eq!(regs[0].kind(), RegistrationKind::ServiceDynamic);
        assert_eq!(regs[2].kind(), RegistrationKind::Static);
        let LayerRegistration::ServiceDynamic(service) = &regs[0] else {
            panic!("expected dynamic service");
        };
        assert_eq!(service.visible_layers, vec![SubLayerId(2), SubLayerId(3)]);
        assert!(regs.iter().all(|r| r.validate().is_ok()));
    }

    #[test]
    fn rejects_unknown_type() {
        let json = r#"{"type": "wmts", "name": "x"}"#;
        assert!(serde_json::from_str::<LayerRegistration>(json).is_err());
    }

    #[test]
    fn static_leaves_need_a_layer() {
        let reg = LayerRegistration::Static(StaticRegistration::group(
            "Group",
            vec![
                StaticRegistration::leaf("ok", MapLayer::new(1)),
                StaticRegistration {
                    name: "broken".to_string(),
                    layer: None,
                    children: None,
                    legend: None,
                    enabled: false,
                },
            ],
        ));
        assert_eq!(
            reg.validate(),
            Err(RegistrationError::MissingLayer {
                name: "broken".to_string()
            })
        );
    }

    #[test]
    fn names_and_urls_are_required() {
        let reg = LayerRegistration::Static(StaticRegistration::leaf(" ", MapLayer::new(1)));
        assert_eq!(
            reg.validate(),
            Err(RegistrationError::EmptyName {
                kind: RegistrationKind::Static
            })
        );

        let json = r#"{"type": "service-feature", "name": "F", "layer": {"id": 1, "url": ""}}"#;
        let reg: LayerRegistration = serde_json::from_str(json).unwrap();
        assert!(matches!(
            reg.validate(),
            Err(RegistrationError::EmptyServiceUrl { .. })
        ));
    }
}

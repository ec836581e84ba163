//! Named IRF sets
//!
//! IRF bundles are registered by name (e.g. `P8R3_SOURCE_V3`) together with
//! the event types they support and looked up with `NAME::TYPE` identifiers
//! (e.g. `P8R3_SOURCE_V3::FRONT`). Bundles are loaded on first use.

use std::collections::{btree_map::Entry, BTreeMap};

use strum::IntoEnumIterator;

use crate::{
    error::ErrorKind,
    irfs::Irfs,
    loader::{CalibrationLoader, LoaderError},
    psf::EventType,
};

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("invalid response identifier {0:?}, expected NAME::TYPE")]
    InvalidId(String),
    #[error("unknown IRF set {0:?}")]
    UnknownIrf(String),
    #[error("event type {event_type} is not available for {name}")]
    UnknownEventType { name: String, event_type: String },
    #[error("Failed to compile the identifier regex")]
    Regex(#[from] regex::Error),
    #[error("Failed to load the IRF set")]
    Loader(#[from] LoaderError),
}
type Result<T> = std::result::Result<T, RegistryError>;
impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Splits a `NAME::TYPE` response identifier
pub fn parse_id(id: &str) -> Result<(String, EventType)> {
    let re = regex::Regex::new(r"^(\w+)::(\w+)$")?;
    let caps = re
        .captures(id.trim())
        .ok_or_else(|| RegistryError::InvalidId(id.to_string()))?;
    let name = caps[1].to_string();
    let event_type = caps[2]
        .parse::<EventType>()
        .map_err(|_| RegistryError::UnknownEventType {
            name: name.clone(),
            event_type: caps[2].to_string(),
        })?;
    Ok((name, event_type))
}
fn response_id(name: &str, event_type: EventType) -> String {
    format!("{name}::{}", event_type.to_string().to_uppercase())
}

/// IRF sets indexed by name
#[derive(Debug, Default)]
pub struct IrfRegistry {
    loaders: BTreeMap<String, (Vec<EventType>, CalibrationLoader)>,
    bundles: BTreeMap<String, Irfs>,
}
impl IrfRegistry {
    pub fn new() -> Self {
        Default::default()
    }
    /// Registers the IRF set `name` for the given event types
    ///
    /// Registering an existing name replaces it and drops its loaded bundles.
    pub fn register<S: Into<String>>(
        &mut self,
        name: S,
        event_types: &[EventType],
        loader: CalibrationLoader,
    ) -> &mut Self {
        let name = name.into();
        self.bundles
            .retain(|id, _| id.split("::").next() != Some(name.as_str()));
        log::debug!("Registering {name} for {:?}", event_types);
        self.loaders.insert(name, (event_types.to_vec(), loader));
        self
    }
    /// Registers the IRF set `name` for all the event types
    pub fn register_all<S: Into<String>>(&mut self, name: S, loader: CalibrationLoader) -> &mut Self {
        let event_types: Vec<EventType> = EventType::iter().collect();
        self.register(name, &event_types, loader)
    }
    /// Adds an already built bundle under `NAME::TYPE`
    pub fn insert(&mut self, name: &str, irfs: Irfs) -> &mut Self {
        let event_type = irfs.event_type();
        self.bundles.insert(response_id(name, event_type), irfs);
        self
    }
    /// Registered IRF set names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaders.keys().cloned().collect();
        for id in self.bundles.keys() {
            if let Some(name) = id.split("::").next() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        names
    }
    /// All the `NAME::TYPE` identifiers that can be looked up
    pub fn response_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .loaders
            .iter()
            .flat_map(|(name, (event_types, _))| {
                event_types.iter().map(move |et| response_id(name, *et))
            })
            .chain(self.bundles.keys().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
    /// Checks if the bundle `id` has been built already
    pub fn is_loaded(&self, id: &str) -> bool {
        parse_id(id)
            .map(|(name, et)| self.bundles.contains_key(&response_id(&name, et)))
            .unwrap_or(false)
    }
    /// Returns the bundle `id`, loading it on first use
    pub fn irfs(&mut self, id: &str) -> Result<&mut Irfs> {
        let (name, event_type) = parse_id(id)?;
        match self.bundles.entry(response_id(&name, event_type)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let (event_types, loader) = self
                    .loaders
                    .get(&name)
                    .ok_or_else(|| RegistryError::UnknownIrf(name.clone()))?;
                if !event_types.contains(&event_type) {
                    return Err(RegistryError::UnknownEventType {
                        name,
                        event_type: event_type.to_string(),
                    });
                }
                let irfs = loader.clone().event_type(event_type).load()?;
                log::info!("{} ready", entry.key());
                Ok(entry.insert(irfs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::calibration_dir;

    fn registry(name: &str) -> IrfRegistry {
        let dir = calibration_dir(name, false);
        let mut registry = IrfRegistry::new();
        registry.register_all("P8R3_TEST_V1", CalibrationLoader::new(&dir));
        registry.register(
            "P8R3_FRONT_V1",
            &[EventType::Front],
            CalibrationLoader::new(&dir),
        );
        registry
    }

    #[test]
    fn identifiers() {
        assert_eq!(
            parse_id("P8R3_SOURCE_V3::FRONT").unwrap(),
            ("P8R3_SOURCE_V3".to_string(), EventType::Front)
        );
        assert_eq!(parse_id(" A::back ").unwrap().1, EventType::Back);
        assert!(matches!(
            parse_id("P8R3_SOURCE_V3"),
            Err(RegistryError::InvalidId(_))
        ));
        assert!(matches!(
            parse_id("P8R3_SOURCE_V3::PSF0"),
            Err(RegistryError::UnknownEventType { .. })
        ));
    }

    #[test]
    fn lazy_loading() {
        let mut registry = registry("registry_lazy");
        assert_eq!(registry.names(), vec!["P8R3_FRONT_V1", "P8R3_TEST_V1"]);
        assert_eq!(registry.response_ids().len(), 3);
        assert!(!registry.is_loaded("P8R3_TEST_V1::BACK"));
        let irfs = registry.irfs("P8R3_TEST_V1::BACK").unwrap();
        assert_eq!(irfs.event_type(), EventType::Back);
        assert!(registry.is_loaded("P8R3_TEST_V1::BACK"));
        assert!(!registry.is_loaded("P8R3_TEST_V1::FRONT"));
    }

    #[test]
    fn unknown() {
        let mut registry = registry("registry_unknown");
        let err = registry.irfs("P8R3_NONE_V1::FRONT").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownIrf(_)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(
            registry.irfs("P8R3_FRONT_V1::BACK"),
            Err(RegistryError::UnknownEventType { .. })
        ));
    }

    #[test]
    fn prebuilt() {
        let irfs = CalibrationLoader::new(calibration_dir("registry_prebuilt", false))
            .event_type(EventType::Back)
            .load()
            .unwrap();
        let mut registry = IrfRegistry::new();
        registry.insert("CUSTOM", irfs);
        assert!(registry.is_loaded("CUSTOM::BACK"));
        assert_eq!(registry.names(), vec!["CUSTOM"]);
        assert_eq!(registry.response_ids(), vec!["CUSTOM::BACK"]);
        assert!(registry.irfs("CUSTOM::back").is_ok());
        assert!(matches!(
            registry.irfs("CUSTOM::FRONT"),
            Err(RegistryError::UnknownIrf(_))
        ));
    }
}

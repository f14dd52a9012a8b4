//! Read-only storage of validated flag configurations.
//!
//! [`FlagConfigStore`] is built once at startup and never mutated afterwards, so it can be shared
//! between any number of concurrent evaluations without locking.
use std::{collections::HashMap, sync::Arc};

use crate::{
    declaration::{FlagDeclaration, FlagDeclarations},
    CallbackRegistry, ConfigurationError, FlagConfig,
};

/// Immutable index of [`FlagConfig`]s by key and by name.
#[derive(Debug, Default)]
pub struct FlagConfigStore {
    configs: Vec<Arc<FlagConfig>>,
    by_key: HashMap<String, Arc<FlagConfig>>,
    by_name: HashMap<String, Arc<FlagConfig>>,
}

impl FlagConfigStore {
    pub fn builder() -> FlagConfigStoreBuilder {
        FlagConfigStoreBuilder::default()
    }

    /// Validate `declarations` and build a store from them.
    ///
    /// ```
    /// # use izanami_resolver::{CallbackRegistry, FlagConfigStore, FlagDeclarations};
    /// let declarations = FlagDeclarations::from_json(
    ///     r#"{"flags": [{"id": "turbo-mode", "valueType": "BOOLEAN"}]}"#,
    /// )?;
    /// let store = FlagConfigStore::from_declarations(declarations, &CallbackRegistry::new())?;
    /// assert!(store.resolve_by_key("turbo-mode").is_some());
    /// # Ok::<(), izanami_resolver::ConfigurationError>(())
    /// ```
    pub fn from_declarations(
        declarations: FlagDeclarations,
        callbacks: &CallbackRegistry,
    ) -> Result<FlagConfigStore, ConfigurationError> {
        let mut builder = FlagConfigStore::builder();
        builder.callbacks(callbacks.clone());
        for declaration in declarations.flags {
            builder.declare(declaration);
        }
        builder.build()
    }

    pub fn resolve_by_key(&self, id: &str) -> Option<Arc<FlagConfig>> {
        self.by_key.get(id).cloned()
    }

    pub fn resolve_by_name(&self, name: &str) -> Option<Arc<FlagConfig>> {
        self.by_name.get(name).cloned()
    }

    /// Resolve `identifier` as a key first, then as a name.
    pub fn resolve(&self, identifier: &str) -> Option<Arc<FlagConfig>> {
        self.resolve_by_key(identifier)
            .or_else(|| self.resolve_by_name(identifier))
    }

    /// All configurations, in declaration order. Entries shadowed by a later duplicate are not
    /// included.
    pub fn all_configs(&self) -> &[Arc<FlagConfig>] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Collects declarations and validates them all at once in [`FlagConfigStoreBuilder::build`].
#[derive(Debug, Default)]
pub struct FlagConfigStoreBuilder {
    callbacks: CallbackRegistry,
    declarations: Vec<FlagDeclaration>,
}

impl FlagConfigStoreBuilder {
    /// Set the registry used to resolve callback names.
    pub fn callbacks(&mut self, callbacks: CallbackRegistry) -> &mut Self {
        self.callbacks = callbacks;
        self
    }

    pub fn declare(&mut self, declaration: FlagDeclaration) -> &mut Self {
        self.declarations.push(declaration);
        self
    }

    /// Validate all declarations. The first invalid declaration fails the whole build.
    ///
    /// Duplicate keys or names are not an error: the last declaration wins and a warning is
    /// logged.
    pub fn build(self) -> Result<FlagConfigStore, ConfigurationError> {
        let mut by_key: HashMap<String, Arc<FlagConfig>> = HashMap::new();
        let mut by_name: HashMap<String, Arc<FlagConfig>> = HashMap::new();
        let mut order = Vec::new();

        for declaration in self.declarations {
            let config = Arc::new(FlagConfig::from_declaration(declaration, &self.callbacks)?);

            if let Some(previous) = by_key.insert(config.id.clone(), config.clone()) {
                log::warn!(target: "izanami",
                           flag_id:display = config.id;
                           "duplicate flag key, the last declaration wins");
                if let Some(name) = &previous.name {
                    if by_name.get(name).is_some_and(|it| Arc::ptr_eq(it, &previous)) {
                        by_name.remove(name);
                    }
                }
            }

            if let Some(name) = &config.name {
                if let Some(previous) = by_name.insert(name.clone(), config.clone()) {
                    if !Arc::ptr_eq(&previous, &config) {
                        log::warn!(target: "izanami",
                                   flag_name:display = name;
                                   "duplicate flag name, the last declaration wins");
                    }
                }
            }

            order.push(config);
        }

        // Keep only entries that are still reachable by key or name.
        let configs = order
            .into_iter()
            .filter(|config| {
                by_key.get(&config.id).is_some_and(|it| Arc::ptr_eq(it, config))
                    || config
                        .name
                        .as_ref()
                        .and_then(|name| by_name.get(name))
                        .is_some_and(|it| Arc::ptr_eq(it, config))
            })
            .collect();

        Ok(FlagConfigStore {
            configs,
            by_key,
            by_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use serde_json::json;

    use super::FlagConfigStore;
    use crate::{
        declaration::{FlagDeclaration, FlagDeclarations},
        CallbackRegistry, CallbackRequest, ConfigurationError, ErrorStrategy, ValueType,
    };

    fn declaration(id: &str, name: Option<&str>) -> FlagDeclaration {
        FlagDeclaration {
            id: id.to_owned(),
            name: name.map(ToOwned::to_owned),
            description: String::new(),
            value_type: ValueType::Boolean,
            error_strategy: ErrorStrategy::DefaultValue,
            default_value: None,
            callback: None,
        }
    }

    #[test]
    fn resolves_by_key_and_name() {
        let mut builder = FlagConfigStore::builder();
        builder.declare(declaration("id-1", Some("first")));
        let store = builder.build().unwrap();

        assert_eq!(store.resolve_by_key("id-1").unwrap().id, "id-1");
        assert_eq!(store.resolve_by_name("first").unwrap().id, "id-1");
        assert_eq!(store.resolve("first").unwrap().id, "id-1");
        assert!(store.resolve_by_key("first").is_none());
        assert!(store.resolve("unknown").is_none());
    }

    #[test]
    fn last_duplicate_wins() {
        let mut builder = FlagConfigStore::builder();
        builder
            .declare(declaration("id-1", Some("old-name")))
            .declare(FlagDeclaration {
                description: "second".to_owned(),
                ..declaration("id-1", Some("new-name"))
            });
        let store = builder.build().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve_by_key("id-1").unwrap().description, "second");
        assert!(store.resolve_by_name("old-name").is_none());
        assert_eq!(
            store.resolve_by_name("new-name").unwrap().description,
            "second"
        );
    }

    #[test]
    fn duplicate_name_points_to_last_declaration() {
        let mut builder = FlagConfigStore::builder();
        builder
            .declare(declaration("id-1", Some("shared")))
            .declare(declaration("id-2", Some("shared")));
        let store = builder.build().unwrap();

        assert_eq!(store.resolve_by_name("shared").unwrap().id, "id-2");
        // id-1 is still reachable by key.
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn invalid_declaration_fails_the_build() {
        let mut builder = FlagConfigStore::builder();
        builder.declare(declaration("ok", None)).declare(FlagDeclaration {
            default_value: Some(json!("nope")),
            ..declaration("bad", None)
        });

        assert!(matches!(
            builder.build(),
            Err(ConfigurationError::InvalidDefaultValue { .. })
        ));
    }

    #[test]
    fn builds_from_fixture() {
        let json = fs::read_to_string("tests/data/flags.json").unwrap();
        let mut callbacks = CallbackRegistry::new();
        callbacks.register("banner-fallback", |_: CallbackRequest| json!({"text": "hi"}));

        let store =
            FlagConfigStore::from_declarations(FlagDeclarations::from_json(&json).unwrap(), &callbacks)
                .unwrap();

        assert_eq!(store.all_configs().len(), 6);
        let banner = store.resolve_by_name("banner").unwrap();
        assert!(banner.callback.as_ref().unwrap().is_resolved());
        assert!(Arc::ptr_eq(
            &banner,
            &store.resolve_by_key("banner-settings").unwrap()
        ));
    }

    #[test]
    fn can_be_read_from_another_thread() {
        let mut builder = FlagConfigStore::builder();
        builder.declare(declaration("id-1", None));
        let store = Arc::new(builder.build().unwrap());

        let handle = {
            let store = store.clone();
            std::thread::spawn(move || store.resolve_by_key("id-1").is_some())
        };

        assert!(handle.join().unwrap());
    }
}

//! Symbolic delivery methods and how they become live transports.
//!
//! A [`TransportRegistry`] maps a name such as `"file"` to a constructor and
//! the default settings that constructor is given. Resolving a message looks
//! the requested name up, layers any per-call overrides on top of the
//! defaults, builds the transport and attaches it to the message together
//! with the registry's policy flags.
//!
//! The table itself is never edited in place. Every registration clones the
//! current table, changes the clone and publishes it, so a concurrent
//! [`TransportRegistry::resolve`] always works from a complete snapshot.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use texter_common::{Message, Result, Settings, TexterError, Transport, internal};
use texter_tracing::traced;

use crate::backends::file::FileTransport;

/// Builds a live transport from its merged settings.
pub type Constructor = Arc<dyn Fn(&Settings) -> Result<Arc<dyn Transport>> + Send + Sync>;

/// A transport that can be built from a typed settings struct.
pub trait TransportType: Transport + Sized + 'static {
    type Settings: DeserializeOwned;

    ///
    /// Construct the transport
    ///
    /// # Errors
    /// If the settings describe a transport that cannot be built.
    ///
    fn from_settings(settings: Self::Settings) -> Result<Self>;
}

/// What a caller asked to deliver through.
#[derive(Clone)]
pub enum DeliveryMethod {
    /// A registered delivery method, looked up by name.
    Named(String),
    /// A transport the caller built themselves. Used as-is.
    Transport(Arc<dyn Transport>),
}

impl fmt::Debug for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Transport(transport) => f.debug_tuple("Transport").field(transport).finish(),
        }
    }
}

impl From<&str> for DeliveryMethod {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for DeliveryMethod {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl From<Arc<dyn Transport>> for DeliveryMethod {
    fn from(value: Arc<dyn Transport>) -> Self {
        Self::Transport(value)
    }
}

#[derive(Clone)]
struct Entry {
    constructor: Constructor,
    settings: Arc<Settings>,
}

/// Layer `overrides` on top of `defaults`. Keys in `overrides` win.
#[must_use]
pub fn merge_settings(defaults: &Settings, overrides: Option<&Settings>) -> Settings {
    let mut merged = defaults.clone();
    if let Some(overrides) = overrides {
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Deserialize a settings map into a transport's typed settings.
///
/// # Errors
/// [`TexterError::Settings`] when the map does not fit `T`.
pub fn typed_settings<T: DeserializeOwned>(transport: &str, settings: &Settings) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(settings.clone())).map_err(|source| {
        TexterError::Settings {
            transport: transport.to_string(),
            source,
        }
    })
}

/// Per-texter table of delivery methods plus the delivery policy flags.
pub struct TransportRegistry {
    entries: RwLock<Arc<HashMap<String, Entry>>>,
    default_method: RwLock<Option<String>>,
    perform_deliveries: AtomicBool,
    raise_delivery_errors: AtomicBool,
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("methods", &self.methods())
            .field("default_method", &self.default_method())
            .field("perform_deliveries", &self.perform_deliveries())
            .field("raise_delivery_errors", &self.raise_delivery_errors())
            .finish()
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRegistry {
    /// An empty registry with no default method.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(HashMap::new())),
            default_method: RwLock::new(None),
            perform_deliveries: AtomicBool::new(true),
            raise_delivery_errors: AtomicBool::new(true),
        }
    }

    /// A registry with the built-in `file` method registered and selected.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register::<FileTransport>(FileTransport::NAME, FileTransport::default_settings());
        *registry.default_method.write() = Some(FileTransport::NAME.to_string());
        registry
    }

    /// Register `T` under `name` with `defaults` as its settings, replacing
    /// any previous entry of that name.
    pub fn register<T: TransportType>(&self, name: impl Into<String>, defaults: Settings) {
        let name = name.into();
        let transport = name.clone();
        self.register_factory(name, defaults, move |settings: &Settings| {
            let settings = typed_settings::<T::Settings>(&transport, settings)?;
            Ok(Arc::new(T::from_settings(settings)?) as Arc<dyn Transport>)
        });
    }

    /// Register an explicit constructor under `name`, replacing any previous
    /// entry of that name.
    pub fn register_factory<F>(&self, name: impl Into<String>, defaults: Settings, constructor: F)
    where
        F: Fn(&Settings) -> Result<Arc<dyn Transport>> + Send + Sync + 'static,
    {
        let name = name.into();
        let entry = Entry {
            constructor: Arc::new(constructor),
            settings: Arc::new(defaults),
        };

        let mut entries = self.entries.write();
        let mut next: HashMap<String, Entry> = (**entries).clone();
        next.insert(name.clone(), entry);
        *entries = Arc::new(next);

        internal!("Registered delivery method {name}");
    }

    /// Merge `overrides` into the registered defaults of `name`.
    ///
    /// # Errors
    /// [`TexterError::InvalidDeliveryMethod`] if `name` is not registered.
    pub fn configure(&self, name: &str, overrides: &Settings) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get(name)
            .ok_or_else(|| TexterError::InvalidDeliveryMethod(name.to_string()))?;

        let updated = Entry {
            constructor: Arc::clone(&entry.constructor),
            settings: Arc::new(merge_settings(&entry.settings, Some(overrides))),
        };

        let mut next: HashMap<String, Entry> = (**entries).clone();
        next.insert(name.to_string(), updated);
        *entries = Arc::new(next);

        internal!("Configured delivery method {name}");
        Ok(())
    }

    /// Whether `name` is a registered delivery method.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// The registered default settings for `name`.
    #[must_use]
    pub fn settings(&self, name: &str) -> Option<Arc<Settings>> {
        self.entries
            .read()
            .get(name)
            .map(|entry| Arc::clone(&entry.settings))
    }

    /// The settings `name` would be constructed with given `overrides`.
    ///
    /// # Errors
    /// [`TexterError::InvalidDeliveryMethod`] if `name` is not registered.
    pub fn effective_settings(&self, name: &str, overrides: Option<&Settings>) -> Result<Settings> {
        self.settings(name)
            .map(|defaults| merge_settings(&defaults, overrides))
            .ok_or_else(|| TexterError::InvalidDeliveryMethod(name.to_string()))
    }

    #[must_use]
    pub fn default_method(&self) -> Option<String> {
        self.default_method.read().clone()
    }

    /// Select the method used when a message does not ask for one.
    ///
    /// # Errors
    /// [`TexterError::InvalidDeliveryMethod`] if `name` is not registered.
    pub fn set_default_method(&self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(TexterError::InvalidDeliveryMethod(name.to_string()));
        }

        *self.default_method.write() = Some(name.to_string());
        Ok(())
    }

    /// Forget the default method. Messages then have to name one.
    pub fn clear_default_method(&self) {
        *self.default_method.write() = None;
    }

    #[must_use]
    pub fn perform_deliveries(&self) -> bool {
        self.perform_deliveries.load(Ordering::Acquire)
    }

    pub fn set_perform_deliveries(&self, perform: bool) {
        self.perform_deliveries.store(perform, Ordering::Release);
    }

    #[must_use]
    pub fn raise_delivery_errors(&self) -> bool {
        self.raise_delivery_errors.load(Ordering::Acquire)
    }

    pub fn set_raise_delivery_errors(&self, raise: bool) {
        self.raise_delivery_errors.store(raise, Ordering::Release);
    }

    /// Attach a transport to `message` and copy the policy flags onto it.
    ///
    /// Without a requested method the default method is used. Overrides are
    /// only consulted for named methods; a caller-built transport is used
    /// exactly as given. The policy flags are read now, not when the message
    /// was created.
    ///
    /// # Errors
    /// - [`TexterError::MissingDeliveryMethod`] with neither a request nor a default
    /// - [`TexterError::InvalidDeliveryMethod`] for an unregistered name
    /// - Whatever the transport's constructor fails with
    #[traced]
    pub fn resolve(
        &self,
        message: &mut Message,
        method: Option<DeliveryMethod>,
        overrides: Option<&Settings>,
    ) -> Result<()> {
        let method = match method {
            Some(method) => method,
            None => DeliveryMethod::Named(
                self.default_method()
                    .ok_or(TexterError::MissingDeliveryMethod)?,
            ),
        };

        let transport = match method {
            DeliveryMethod::Named(name) => {
                let snapshot: Arc<HashMap<String, Entry>> = self.entries.read().clone();
                let entry = snapshot
                    .get(&name)
                    .ok_or_else(|| TexterError::InvalidDeliveryMethod(name.clone()))?;
                let settings = merge_settings(&entry.settings, overrides);
                internal!("Resolved delivery method {name}");
                (entry.constructor)(&settings)?
            }
            DeliveryMethod::Transport(transport) => transport,
        };

        message.set_transport(transport);
        message.set_perform_deliveries(self.perform_deliveries());
        message.set_raise_delivery_errors(self.raise_delivery_errors());

        Ok(())
    }
}

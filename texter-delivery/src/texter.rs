//! Texters: named sets of actions that each produce a text message.
//!
//! A texter is assembled once with a [`TexterBuilder`] and then shared as an
//! `Arc<Texter>`. Invoking one of its actions with [`Texter::call`] does no
//! work yet; it hands back a [`MessageDelivery`] that runs the action the
//! first time the message is needed.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
    time::Instant,
};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use texter_common::{
    DeliveryHandler, ErrorKind, Message, Recipients, Result, Settings, TexterError, internal,
};
use texter_tracing::traced;
use texter_transport::{Deliveries, TestTransport, TransportRegistry, TransportType};

use crate::{
    config::TexterConfig,
    context::ActionContext,
    delivery::MessageDelivery,
    instrument::{Event, Notifications, Subscriber},
    job::{JobQueue, MemoryJobQueue},
    render::{NoTemplates, Renderer},
    rescue::RescuePipeline,
};

/// Queue used by `deliver_later` unless configured otherwise.
pub const DEFAULT_QUEUE_NAME: &str = "texters";

/// An action body, or a callback run around one.
pub type Action = Arc<dyn Fn(&mut ActionContext<'_>) -> Result<()> + Send + Sync>;

/// A texter-level default for a text option.
pub enum DefaultValue<T> {
    Value(T),
    /// Evaluated when `text` is called, before the action's own options
    /// are applied.
    Lazy(Arc<dyn Fn(&ActionContext<'_>) -> T + Send + Sync>),
}

impl<T: Clone> DefaultValue<T> {
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> T + Send + Sync + 'static,
    {
        Self::Lazy(Arc::new(f))
    }

    #[must_use]
    pub fn resolve(&self, context: &ActionContext<'_>) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Lazy(f) => f(context),
        }
    }
}

impl<T: Clone> Clone for DefaultValue<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Lazy(f) => Self::Lazy(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DefaultValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Lazy(_) => f.write_str("Lazy"),
        }
    }
}

/// Defaults merged under the options an action passes to `text`.
#[derive(Debug, Clone, Default)]
pub struct TextDefaults {
    pub charset: Option<DefaultValue<String>>,
    pub to: Option<DefaultValue<Recipients>>,
}

/// `NotifierTexter` becomes `notifier_texter`, `Admin::SmsTexter` becomes
/// `admin/sms_texter`.
#[must_use]
pub fn underscore(name: &str) -> String {
    let name = name.replace("::", "/");
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let previous = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            let boundary = match previous {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' {
            out.push('_');
        } else {
            out.push(c);
        }
    }

    out
}

pub struct Texter {
    name: String,
    texter_name: String,
    actions: HashMap<String, Action>,
    before_actions: Vec<Action>,
    after_actions: Vec<Action>,
    defaults: TextDefaults,
    registry: TransportRegistry,
    rescue: RescuePipeline,
    renderer: Arc<dyn Renderer>,
    job_queue: Arc<dyn JobQueue>,
    deliver_later_queue_name: RwLock<String>,
    notifications: Arc<Notifications>,
    this: Weak<Self>,
}

impl fmt::Debug for Texter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texter")
            .field("name", &self.name)
            .field("texter_name", &self.texter_name)
            .field("actions", &self.action_names())
            .field("registry", &self.registry)
            .field("rescue", &self.rescue)
            .field("deliver_later_queue_name", &self.deliver_later_queue_name())
            .finish_non_exhaustive()
    }
}

impl Texter {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TexterBuilder {
        TexterBuilder::new(name)
    }

    /// The name the texter was registered under, e.g. `NotifierTexter`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default template path, e.g. `notifier_texter`.
    #[must_use]
    pub fn texter_name(&self) -> &str {
        &self.texter_name
    }

    #[must_use]
    pub fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub const fn defaults(&self) -> &TextDefaults {
        &self.defaults
    }

    #[must_use]
    pub const fn registry(&self) -> &TransportRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn rescue(&self) -> &RescuePipeline {
        &self.rescue
    }

    #[must_use]
    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    #[must_use]
    pub fn job_queue(&self) -> &dyn JobQueue {
        self.job_queue.as_ref()
    }

    #[must_use]
    pub const fn notifications(&self) -> &Arc<Notifications> {
        &self.notifications
    }

    /// Select the delivery method used when an action does not name one.
    ///
    /// # Errors
    /// [`TexterError::InvalidDeliveryMethod`] if `name` is not registered.
    pub fn set_delivery_method(&self, name: &str) -> Result<()> {
        self.registry.set_default_method(name)
    }

    #[must_use]
    pub fn perform_deliveries(&self) -> bool {
        self.registry.perform_deliveries()
    }

    pub fn set_perform_deliveries(&self, perform: bool) {
        self.registry.set_perform_deliveries(perform);
    }

    #[must_use]
    pub fn raise_delivery_errors(&self) -> bool {
        self.registry.raise_delivery_errors()
    }

    pub fn set_raise_delivery_errors(&self, raise: bool) {
        self.registry.set_raise_delivery_errors(raise);
    }

    #[must_use]
    pub fn deliver_later_queue_name(&self) -> String {
        self.deliver_later_queue_name.read().clone()
    }

    pub fn set_deliver_later_queue_name(&self, queue: impl Into<String>) {
        *self.deliver_later_queue_name.write() = queue.into();
    }

    /// Register the `test` method recording into `deliveries` and make it
    /// the default.
    ///
    /// # Errors
    /// As [`Texter::set_delivery_method`].
    pub fn use_test_transport(&self, deliveries: &Deliveries) -> Result<()> {
        self.registry.register_factory(
            TestTransport::NAME,
            Settings::new(),
            TestTransport::factory(deliveries.clone()),
        );
        self.registry.set_default_method(TestTransport::NAME)
    }

    /// Invoke `action` with `args`. Nothing runs until the returned handle
    /// is asked for its message or told to deliver.
    ///
    /// # Errors
    /// [`TexterError::UnknownAction`] if no action of that name was registered.
    pub fn call(self: &Arc<Self>, action: &str, args: Vec<Value>) -> Result<MessageDelivery> {
        if !self.has_action(action) {
            return Err(self.unknown_action(action));
        }

        Ok(MessageDelivery::new(Arc::clone(self), action, args))
    }

    fn unknown_action(&self, action: &str) -> TexterError {
        TexterError::UnknownAction {
            texter: self.name.clone(),
            action: action.to_string(),
        }
    }

    /// Run `action` and hand back the message it produced.
    ///
    /// The before callbacks, the action and the after callbacks run inside
    /// the rescue pipeline. An action that never called `text`, or whose
    /// error was rescued before it did, yields a null message.
    ///
    /// # Errors
    /// [`TexterError::UnknownAction`], or any error the rescue pipeline did
    /// not swallow.
    #[traced(timing(precision = "us"))]
    pub fn process(&self, action: &str, args: &[Value]) -> Result<Message> {
        let handler = self
            .actions
            .get(action)
            .ok_or_else(|| self.unknown_action(action))?;

        let started = Instant::now();
        let mut context = ActionContext::new(self, action, args);
        let result = self
            .rescue
            .handle_exceptions(self.run_action(handler, &mut context));

        self.notifications.publish(&Event::Process {
            texter: self.name.clone(),
            action: action.to_string(),
            duration: started.elapsed(),
            failed: result.is_err(),
        });

        result?;
        Ok(context.into_message())
    }

    fn run_action(&self, handler: &Action, context: &mut ActionContext<'_>) -> Result<()> {
        for callback in &self.before_actions {
            callback(context)?;
        }
        handler(context)?;
        for callback in &self.after_actions {
            callback(context)?;
        }
        Ok(())
    }

    /// Give `error` to this texter's rescue handlers.
    ///
    /// # Errors
    /// `error` when no handler accepts it, or the handler's own failure.
    pub fn handle_exception(&self, error: TexterError) -> Result<()> {
        self.rescue.handle_exception(error)
    }

    /// `Ok(None)` when a handler swallowed the error of `result`.
    ///
    /// # Errors
    /// As [`Texter::handle_exception`].
    pub fn handle_exceptions<T>(&self, result: Result<T>) -> Result<Option<T>> {
        self.rescue.handle_exceptions(result)
    }

    pub(crate) fn delivery_handler(&self) -> Weak<dyn DeliveryHandler> {
        self.this.clone()
    }
}

#[async_trait]
impl DeliveryHandler for Texter {
    async fn deliver_text<'a>(
        &'a self,
        message: &'a Message,
        delivery: BoxFuture<'a, Result<()>>,
    ) -> Result<()> {
        let started = Instant::now();
        let result = delivery.await;

        self.notifications.publish(&Event::Deliver {
            texter: self.name.clone(),
            to: message.to().to_vec(),
            body: message.body().map(str::to_string),
            duration: started.elapsed(),
            failed: result.is_err(),
        });

        result
    }
}

/// Assembles a [`Texter`].
pub struct TexterBuilder {
    name: String,
    texter_name: Option<String>,
    actions: HashMap<String, Action>,
    before_actions: Vec<Action>,
    after_actions: Vec<Action>,
    defaults: TextDefaults,
    registry: TransportRegistry,
    delivery_method: Option<String>,
    transport_settings: Vec<(String, Settings)>,
    perform_deliveries: bool,
    raise_delivery_errors: bool,
    deliver_later_queue_name: String,
    rescue: RescuePipeline,
    renderer: Arc<dyn Renderer>,
    job_queue: Arc<dyn JobQueue>,
    notifications: Option<Arc<Notifications>>,
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl fmt::Debug for TexterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TexterBuilder")
            .field("name", &self.name)
            .field("delivery_method", &self.delivery_method)
            .finish_non_exhaustive()
    }
}

impl TexterBuilder {
    /// A builder with the `file` method registered and selected, no
    /// templates and an in-memory job queue.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            texter_name: None,
            actions: HashMap::new(),
            before_actions: Vec::new(),
            after_actions: Vec::new(),
            defaults: TextDefaults::default(),
            registry: TransportRegistry::with_defaults(),
            delivery_method: None,
            transport_settings: Vec::new(),
            perform_deliveries: true,
            raise_delivery_errors: true,
            deliver_later_queue_name: DEFAULT_QUEUE_NAME.to_string(),
            rescue: RescuePipeline::new(),
            renderer: Arc::new(NoTemplates),
            job_queue: Arc::new(MemoryJobQueue::new()),
            notifications: None,
            subscribers: Vec::new(),
        }
    }

    /// Override the template path derived from the texter's name.
    #[must_use]
    pub fn texter_name(mut self, texter_name: impl Into<String>) -> Self {
        self.texter_name = Some(texter_name.into());
        self
    }

    #[must_use]
    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    #[must_use]
    pub fn before_action<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.before_actions.push(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn after_action<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.after_actions.push(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn default_charset(mut self, charset: impl Into<String>) -> Self {
        self.defaults.charset = Some(DefaultValue::Value(charset.into()));
        self
    }

    #[must_use]
    pub fn default_charset_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> String + Send + Sync + 'static,
    {
        self.defaults.charset = Some(DefaultValue::lazy(f));
        self
    }

    #[must_use]
    pub fn default_to(mut self, to: impl Into<Recipients>) -> Self {
        self.defaults.to = Some(DefaultValue::Value(to.into()));
        self
    }

    #[must_use]
    pub fn default_to_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> Recipients + Send + Sync + 'static,
    {
        self.defaults.to = Some(DefaultValue::lazy(f));
        self
    }

    /// Register `T` as a delivery method, replacing any of the same name.
    #[must_use]
    pub fn transport<T: TransportType>(self, name: impl Into<String>, defaults: Settings) -> Self {
        self.registry.register::<T>(name, defaults);
        self
    }

    /// Register a delivery method with an explicit constructor.
    #[must_use]
    pub fn transport_factory<F>(self, name: impl Into<String>, defaults: Settings, f: F) -> Self
    where
        F: Fn(&Settings) -> Result<Arc<dyn texter_common::Transport>> + Send + Sync + 'static,
    {
        self.registry.register_factory(name, defaults, f);
        self
    }

    /// Layer `overrides` over the registered settings of `name` when built.
    #[must_use]
    pub fn transport_settings(mut self, name: impl Into<String>, overrides: Settings) -> Self {
        self.transport_settings.push((name.into(), overrides));
        self
    }

    #[must_use]
    pub fn delivery_method(mut self, name: impl Into<String>) -> Self {
        self.delivery_method = Some(name.into());
        self
    }

    /// Deliver through the `test` method, recording into `deliveries`.
    #[must_use]
    pub fn test_transport(self, deliveries: &Deliveries) -> Self {
        self.transport_factory(
            TestTransport::NAME,
            Settings::new(),
            TestTransport::factory(deliveries.clone()),
        )
        .delivery_method(TestTransport::NAME)
    }

    #[must_use]
    pub const fn perform_deliveries(mut self, perform: bool) -> Self {
        self.perform_deliveries = perform;
        self
    }

    #[must_use]
    pub const fn raise_delivery_errors(mut self, raise: bool) -> Self {
        self.raise_delivery_errors = raise;
        self
    }

    #[must_use]
    pub fn deliver_later_queue_name(mut self, queue: impl Into<String>) -> Self {
        self.deliver_later_queue_name = queue.into();
        self
    }

    #[must_use]
    pub fn rescue_from<F>(mut self, kind: ErrorKind, handler: F) -> Self
    where
        F: Fn(TexterError) -> Result<()> + Send + Sync + 'static,
    {
        self.rescue.rescue_from(kind, handler);
        self
    }

    #[must_use]
    pub fn rescue_if<P, F>(mut self, predicate: P, handler: F) -> Self
    where
        P: Fn(&TexterError) -> bool + Send + Sync + 'static,
        F: Fn(TexterError) -> Result<()> + Send + Sync + 'static,
    {
        self.rescue.rescue_if(predicate, handler);
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    #[must_use]
    pub fn job_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.job_queue = queue;
        self
    }

    /// Publish events to a shared hub instead of a private one.
    #[must_use]
    pub fn notifications(mut self, notifications: Arc<Notifications>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    #[must_use]
    pub fn subscribe(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Apply everything `config` sets.
    #[must_use]
    pub fn with_config(mut self, config: &TexterConfig) -> Self {
        if let Some(method) = &config.delivery_method {
            self.delivery_method = Some(method.clone());
        }
        self.perform_deliveries = config.perform_deliveries;
        self.raise_delivery_errors = config.raise_delivery_errors;
        self.deliver_later_queue_name
            .clone_from(&config.deliver_later_queue_name);

        if let Some(charset) = &config.default.charset {
            self.defaults.charset = Some(DefaultValue::Value(charset.clone()));
        }
        if let Some(to) = &config.default.to {
            self.defaults.to = Some(DefaultValue::Value(to.clone()));
        }

        let mut transports: Vec<_> = config.transports.iter().collect();
        transports.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (name, settings) in transports {
            self.transport_settings
                .push((name.clone(), settings.clone()));
        }

        self
    }

    /// # Errors
    /// [`TexterError::InvalidDeliveryMethod`] if the selected delivery
    /// method, or one given settings, was never registered.
    pub fn build(self) -> Result<Arc<Texter>> {
        for (name, overrides) in &self.transport_settings {
            self.registry.configure(name, overrides)?;
        }
        if let Some(method) = &self.delivery_method {
            self.registry.set_default_method(method)?;
        }
        self.registry.set_perform_deliveries(self.perform_deliveries);
        self.registry
            .set_raise_delivery_errors(self.raise_delivery_errors);

        let notifications = self
            .notifications
            .unwrap_or_else(|| Arc::new(Notifications::with_log_subscriber()));
        for subscriber in self.subscribers {
            notifications.subscribe(subscriber);
        }

        let texter_name = self.texter_name.unwrap_or_else(|| underscore(&self.name));
        internal!(
            level = DEBUG,
            "Built texter {} with actions {:?}",
            self.name,
            self.actions.keys().collect::<Vec<_>>()
        );

        Ok(Arc::new_cyclic(|this| Texter {
            name: self.name,
            texter_name,
            actions: self.actions,
            before_actions: self.before_actions,
            after_actions: self.after_actions,
            defaults: self.defaults,
            registry: self.registry,
            rescue: self.rescue,
            renderer: self.renderer,
            job_queue: self.job_queue,
            deliver_later_queue_name: RwLock::new(self.deliver_later_queue_name),
            notifications,
            this: this.clone(),
        }))
    }
}

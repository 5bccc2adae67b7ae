use serde::de::DeserializeOwned;
use serde_json::Value;
use texter_common::{DEFAULT_CHARSET, Message, Recipients, Result, Settings, TexterError};
use texter_transport::DeliveryMethod;

use crate::{
    render::{Assigns, RenderRequest},
    texter::Texter,
};

/// Options an action passes to [`ActionContext::text`].
///
/// Anything left unset falls back to the texter's defaults.
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    pub to: Option<Recipients>,
    pub charset: Option<String>,
    /// Use this body instead of rendering a template.
    pub body: Option<String>,
    /// Defaults to the texter name.
    pub template_path: Option<String>,
    /// Defaults to the action name.
    pub template_name: Option<String>,
    /// Defaults to the texter's delivery method.
    pub delivery_method: Option<DeliveryMethod>,
    /// Layered over the registered settings of a named delivery method.
    pub delivery_method_options: Option<Settings>,
}

impl TextOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn to(mut self, to: impl Into<Recipients>) -> Self {
        self.to = Some(to.into());
        self
    }

    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn template_path(mut self, path: impl Into<String>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn delivery_method(mut self, method: impl Into<DeliveryMethod>) -> Self {
        self.delivery_method = Some(method.into());
        self
    }

    #[must_use]
    pub fn delivery_method_options(mut self, options: Settings) -> Self {
        self.delivery_method_options = Some(options);
        self
    }
}

/// The state an action works on while it runs.
pub struct ActionContext<'a> {
    texter: &'a Texter,
    action: &'a str,
    args: &'a [Value],
    assigns: Assigns,
    message: Message,
    text_called: bool,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(texter: &'a Texter, action: &'a str, args: &'a [Value]) -> Self {
        Self {
            texter,
            action,
            args,
            assigns: Assigns::new(),
            message: Message::new(),
            text_called: false,
        }
    }

    #[must_use]
    pub const fn texter(&self) -> &'a Texter {
        self.texter
    }

    #[must_use]
    pub const fn action_name(&self) -> &'a str {
        self.action
    }

    #[must_use]
    pub const fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Rebuild argument `index` as a `T`.
    ///
    /// # Errors
    /// [`TexterError::Argument`] if there is no such argument or it does not
    /// fit `T`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.args.get(index).ok_or_else(|| TexterError::Argument {
            action: self.action.to_string(),
            index,
            reason: format!("only {} given", self.args.len()),
        })?;

        T::deserialize(value).map_err(|error| TexterError::Argument {
            action: self.action.to_string(),
            index,
            reason: error.to_string(),
        })
    }

    /// Make `value` available to the template as `key`.
    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.assigns.insert(key.into(), value.into());
    }

    #[must_use]
    pub const fn assigns(&self) -> &Assigns {
        &self.assigns
    }

    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    pub const fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    /// Whether [`ActionContext::text`] has populated the message yet.
    #[must_use]
    pub const fn is_text_called(&self) -> bool {
        self.text_called
    }

    /// Populate the message.
    ///
    /// Defaults are evaluated first, then the action's options are laid over
    /// them. The delivery method is resolved before recipients and body are
    /// set. The body is rendered unless one is given. A second call returns
    /// the message unchanged.
    ///
    /// # Errors
    /// Delivery method resolution errors, and [`TexterError::Template`] when
    /// rendering fails.
    pub fn text(&mut self, options: TextOptions) -> Result<&mut Message> {
        if self.text_called {
            return Ok(&mut self.message);
        }

        let texter = self.texter;
        let defaults = texter.defaults();
        let context: &Self = self;
        let default_charset = defaults.charset.as_ref().map(|d| d.resolve(context));
        let default_to = defaults.to.as_ref().map(|d| d.resolve(context));

        let TextOptions {
            to,
            charset,
            body,
            template_path,
            template_name,
            delivery_method,
            delivery_method_options,
        } = options;

        self.message.set_charset(
            charset
                .or(default_charset)
                .unwrap_or_else(|| DEFAULT_CHARSET.to_string()),
        );

        texter.registry().resolve(
            &mut self.message,
            delivery_method,
            delivery_method_options.as_ref(),
        )?;
        self.message.set_delivery_handler(texter.delivery_handler());

        self.message.set_to(to.or(default_to));

        let body = match body {
            Some(body) => body,
            None => {
                let template_paths =
                    vec![template_path.unwrap_or_else(|| texter.texter_name().to_string())];
                let template_name = template_name.unwrap_or_else(|| self.action.to_string());
                texter.renderer().render(&RenderRequest {
                    texter: texter.name(),
                    action: self.action,
                    template_paths: &template_paths,
                    template_name: &template_name,
                    assigns: &self.assigns,
                })?
            }
        };
        self.message.set_body(body);
        self.text_called = true;

        Ok(&mut self.message)
    }

    pub(crate) fn into_message(self) -> Message {
        if self.text_called {
            self.message
        } else {
            Message::null()
        }
    }
}

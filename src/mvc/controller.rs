//! Controller and action contract.
//!
//! Every action returns a boxed future; the dispatcher awaits it whether the
//! action does any asynchronous work or not.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::context::{BundleScope, RequestContext};
use crate::error::RouteError;
use crate::http::response::ApiResponse;
use crate::http::Exchange;

pub type ActionFuture = BoxFuture<'static, Result<ActionOutput, RouteError>>;

/// What an action produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    /// The action wrote the response itself (or forwarded).
    Empty,
    /// Rendered as JSON.
    Api(ApiResponse),
    /// Rendered as HTML.
    View(ViewModel),
    /// Leave the response untouched and fall through to the following
    /// routes.
    Next,
}

impl From<ApiResponse> for ActionOutput {
    fn from(response: ApiResponse) -> Self {
        ActionOutput::Api(response)
    }
}

impl From<ViewModel> for ActionOutput {
    fn from(model: ViewModel) -> Self {
        ActionOutput::View(model)
    }
}

/// Data for the HTML renderer, optionally overriding the resolved view path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    pub data: Value,
    pub view_path: Option<String>,
}

impl ViewModel {
    pub fn new(data: Value) -> Self {
        Self { data, view_path: None }
    }

    pub fn with_view_path(mut self, view_path: impl Into<String>) -> Self {
        self.view_path = Some(view_path.into());
        self
    }
}

/// Positional action arguments. Entries are `None` when a declared parameter
/// name had no captured value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs(Vec<Option<String>>);

impl ActionArgs {
    pub fn new(args: Vec<Option<String>>) -> Self {
        Self(args)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|a| a.as_deref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Option<String>] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for ActionArgs {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(|s| Some(s.into())).collect())
    }
}

/// Everything an action can reach: the exchange, the request context with
/// its bundle scope, the controller parameter bag and the resolved view.
#[derive(Clone)]
pub struct ActionContext {
    pub exchange: Exchange,
    pub ctx: Arc<RequestContext>,
    /// Controller parameters seeded from the route mapping.
    pub params: Map<String, Value>,
    pub view_path: String,
    pub controller_name: String,
    pub action_name: String,
}

impl ActionContext {
    pub fn bundle(&self) -> &BundleScope {
        self.ctx.bundle()
    }
}

pub trait Controller: Send + 'static {
    /// Whether `action` names an entry point of this controller.
    fn has_action(&self, action: &str) -> bool;

    /// Hook run after the request is bound and before the action.
    fn construct(&mut self, _cx: &ActionContext) {}

    fn call(&mut self, action: &str, cx: ActionContext, args: ActionArgs) -> ActionFuture;
}

type ActionFn = dyn Fn(ActionContext, ActionArgs) -> ActionFuture + Send + Sync;
type ConstructFn = dyn Fn(&ActionContext) + Send + Sync;

/// Controller assembled from closures.
#[derive(Clone, Default)]
pub struct FnController {
    actions: HashMap<String, Arc<ActionFn>>,
    construct: Option<Arc<ConstructFn>>,
}

impl FnController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActionContext, ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionOutput, RouteError>> + Send + 'static,
    {
        self.actions
            .insert(name.into(), Arc::new(move |cx, args| Box::pin(f(cx, args))));
        self
    }

    pub fn on_construct<F>(mut self, f: F) -> Self
    where
        F: Fn(&ActionContext) + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(f));
        self
    }
}

impl Controller for FnController {
    fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    fn construct(&mut self, cx: &ActionContext) {
        if let Some(hook) = &self.construct {
            hook(cx);
        }
    }

    fn call(&mut self, action: &str, cx: ActionContext, args: ActionArgs) -> ActionFuture {
        match self.actions.get(action) {
            Some(f) => f(cx, args),
            None => {
                let err = RouteError::ActionNotFound {
                    controller: cx.controller_name.clone(),
                    action: action.to_string(),
                };
                Box::pin(async move { Err(err) })
            }
        }
    }
}

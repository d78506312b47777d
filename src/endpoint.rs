use std::sync::Arc;
use std::task::{Context, Poll};

use http::{Extensions, Method, Request, Response, StatusCode, Uri};
use tower::{Layer, Service};
use tracing::error;

use crate::antiforgery::AntiForgeryOptions;
use crate::middleware::{protect, status_response, BoxFuture, Enforced};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    ProtectedApi = 0,
    SkipAntiForgeryCheck = 1,
    SkipResponseRewrite = 2,
}

impl Tag {
    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Endpoint {
    tags: u8,
}

impl Endpoint {
    pub const fn new() -> Self {
        Endpoint { tags: 0 }
    }

    pub const fn protected_api() -> Self {
        Endpoint::new().with(Tag::ProtectedApi)
    }

    pub const fn with(self, tag: Tag) -> Self {
        Endpoint {
            tags: self.tags | tag.bit(),
        }
    }

    pub const fn skip_anti_forgery_check(self) -> Self {
        self.with(Tag::SkipAntiForgeryCheck)
    }

    pub const fn skip_response_rewrite(self) -> Self {
        self.with(Tag::SkipResponseRewrite)
    }

    pub const fn has(&self, tag: Tag) -> bool {
        self.tags & tag.bit() != 0
    }

    pub const fn is_protected_api(&self) -> bool {
        self.has(Tag::ProtectedApi)
    }

    pub const fn requires_anti_forgery_check(&self) -> bool {
        self.is_protected_api() && !self.has(Tag::SkipAntiForgeryCheck)
    }

    pub const fn requires_response_rewrite(&self) -> bool {
        self.is_protected_api() && !self.has(Tag::SkipResponseRewrite)
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        [
            Tag::ProtectedApi,
            Tag::SkipAntiForgeryCheck,
            Tag::SkipResponseRewrite,
        ]
        .into_iter()
        .filter(|tag| self.has(*tag))
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.tags()).finish()
    }
}

impl FromIterator<Tag> for Endpoint {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        iter.into_iter().fold(Endpoint::new(), Endpoint::with)
    }
}

#[derive(Clone, Debug)]
pub struct FilterMarker {
    anti_forgery: Arc<AntiForgeryOptions>,
}

impl FilterMarker {
    pub(crate) fn new(anti_forgery: Arc<AntiForgeryOptions>) -> Self {
        FilterMarker { anti_forgery }
    }

    pub fn anti_forgery(&self) -> &AntiForgeryOptions {
        &self.anti_forgery
    }
}

pub trait EndpointResolver: std::fmt::Debug + Send + Sync {
    fn resolve(&self, method: &Method, uri: &Uri, extensions: &Extensions) -> Option<Endpoint>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FromExtensions;

impl EndpointResolver for FromExtensions {
    fn resolve(&self, _: &Method, _: &Uri, extensions: &Extensions) -> Option<Endpoint> {
        extensions.get::<Endpoint>().copied()
    }
}

pub(crate) struct Resolve<T: Fn(&Method, &Uri) -> Option<Endpoint>>(pub(crate) T);

impl<T: Fn(&Method, &Uri) -> Option<Endpoint>> std::fmt::Debug for Resolve<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("<fn>").finish()
    }
}

impl<T> EndpointResolver for Resolve<T>
where
    T: Fn(&Method, &Uri) -> Option<Endpoint> + Send + Sync,
{
    fn resolve(&self, method: &Method, uri: &Uri, _: &Extensions) -> Option<Endpoint> {
        self.0(method, uri)
    }
}

impl<S> Layer<S> for Endpoint {
    type Service = Classified<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Classified {
            inner,
            endpoint: *self,
        }
    }
}

// A protected endpoint the filter could not classify before routing is
// enforced here with the options carried by `FilterMarker`. Without the
// marker no filter ran at all, and the request fails closed.
#[derive(Clone, Debug)]
pub struct Classified<S> {
    inner: S,
    endpoint: Endpoint,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for Classified<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: Send,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;
    type Response = Response<ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.extensions_mut().insert(self.endpoint);

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if !self.endpoint.is_protected_api() || req.extensions().get::<Enforced>().is_some() {
            return Box::pin(async move { inner.call(req).await });
        }

        let Some(marker) = req.extensions().get::<FilterMarker>().cloned() else {
            error!(
                path = req.uri().path(),
                "protected endpoint reached without the bff filter in front of it"
            );

            return Box::pin(async move { Ok(status_response(StatusCode::INTERNAL_SERVER_ERROR)) });
        };

        protect(inner, self.endpoint, marker.anti_forgery(), req)
    }
}

use std::future::Future;
use std::pin::Pin;
use std::result::Result;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::{LOCATION, SET_COOKIE};
use http::{Method, Request, Response, StatusCode, Uri};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::antiforgery::{AntiForgeryOptions, ProtectionError};
use crate::endpoint::{Endpoint, EndpointResolver, FilterMarker, FromExtensions, Resolve};

pub(crate) type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

#[derive(Clone, Debug)]
pub struct BffLayer {
    resolver: Arc<dyn EndpointResolver>,
    anti_forgery: Arc<AntiForgeryOptions>,
}

impl Default for BffLayer {
    fn default() -> Self {
        BffLayer {
            resolver: Arc::new(FromExtensions),
            anti_forgery: Arc::new(AntiForgeryOptions::default()),
        }
    }
}

impl BffLayer {
    pub fn with_anti_forgery(self, options: AntiForgeryOptions) -> BffLayer {
        BffLayer {
            resolver: self.resolver,
            anti_forgery: Arc::new(options),
        }
    }

    pub fn with_resolver<F>(self, resolver: F) -> BffLayer
    where
        F: Fn(&Method, &Uri) -> Option<Endpoint> + Send + Sync + 'static,
    {
        BffLayer {
            resolver: Arc::new(Resolve(resolver)),
            anti_forgery: self.anti_forgery,
        }
    }

    pub fn anti_forgery(&self) -> &AntiForgeryOptions {
        &self.anti_forgery
    }
}

impl<S> Layer<S> for BffLayer {
    type Service = BffMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BffMiddleware {
            inner,
            resolver: self.resolver.clone(),
            anti_forgery: self.anti_forgery.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BffMiddleware<S> {
    inner: S,
    resolver: Arc<dyn EndpointResolver>,
    anti_forgery: Arc<AntiForgeryOptions>,
}

impl<S: Default> Default for BffMiddleware<S> {
    fn default() -> Self {
        BffLayer::default().layer(S::default())
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for BffMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: Send,
    S::Future: Future<Output = Result<Response<ResBody>, S::Error>> + Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;
    type Response = Response<ResBody>;

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.extensions_mut()
            .insert(FilterMarker::new(self.anti_forgery.clone()));

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        match self.classify(&req) {
            Some(endpoint) => protect(inner, endpoint, &self.anti_forgery, req),
            // routing has not happened yet, an `Endpoint` layer further in
            // enforces with the options carried by the marker
            None => Box::pin(async move { inner.call(req).await }),
        }
    }

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }
}

impl<S> BffMiddleware<S> {
    fn classify<Body>(&self, req: &Request<Body>) -> Option<Endpoint> {
        self.resolver
            .resolve(req.method(), req.uri(), req.extensions())
            .filter(Endpoint::is_protected_api)
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Enforced;

pub(crate) fn protect<S, ReqBody, ResBody>(
    mut inner: S,
    endpoint: Endpoint,
    anti_forgery: &AntiForgeryOptions,
    mut req: Request<ReqBody>,
) -> BoxFuture<Response<ResBody>, S::Error>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Error: Send,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    if let Err(error) = verify(endpoint, anti_forgery, &req) {
        warn!(path = req.uri().path(), %error, "anti-forgery validation failed");

        return Box::pin(async move { Ok(status_response(StatusCode::UNAUTHORIZED)) });
    }

    req.extensions_mut().insert(Enforced);

    Box::pin(async move {
        let mut res = inner.call(req).await?;

        if endpoint.requires_response_rewrite() && rewrite_challenge(&mut res) {
            debug!("challenge redirect from protected api rewritten to 401");
        }

        Ok(res)
    })
}

fn verify<Body>(
    endpoint: Endpoint,
    anti_forgery: &AntiForgeryOptions,
    req: &Request<Body>,
) -> Result<(), ProtectionError> {
    if !endpoint.requires_anti_forgery_check() {
        return Ok(());
    }

    anti_forgery.check(req.headers())
}

pub(crate) fn status_response<B: Default>(status: StatusCode) -> Response<B> {
    let mut res = Response::new(B::default());
    *res.status_mut() = status;
    res
}

// A protected API never redirects on its own, so a 302 here is the
// interactive login challenge, which a script caller cannot follow.
fn rewrite_challenge<B>(res: &mut Response<B>) -> bool {
    if res.status() != StatusCode::FOUND {
        return false;
    }

    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res.headers_mut().remove(LOCATION);
    res.headers_mut().remove(SET_COOKIE);

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn protected_post() -> http::request::Builder {
        Request::builder()
            .method("POST")
            .uri("/api")
            .extension(Endpoint::protected_api())
    }

    #[test]
    fn test_middleware_debug_trait() {
        let middleware = BffLayer::default().layer(());

        assert_eq!(
            format!("{:?}", middleware),
            "BffMiddleware { inner: (), resolver: FromExtensions, anti_forgery: AntiForgeryOptions { header_name: \"x-csrf\", header_value: \"1\" } }"
        );

        let middleware = BffLayer::default()
            .with_resolver(|_, _| None)
            .layer(());

        assert_eq!(
            format!("{:?}", middleware),
            "BffMiddleware { inner: (), resolver: <fn>, anti_forgery: AntiForgeryOptions { header_name: \"x-csrf\", header_value: \"1\" } }"
        );
    }

    #[test]
    fn test_unclassified_requests_are_not_classified() {
        let middleware: BffMiddleware<()> = Default::default();

        let req = Request::builder().method("POST").body(()).unwrap();
        assert_eq!(middleware.classify(&req), None);

        let req = Request::builder()
            .method("POST")
            .extension(Endpoint::new().skip_response_rewrite())
            .body(())
            .unwrap();
        assert_eq!(middleware.classify(&req), None);
    }

    #[test]
    fn test_protected_request_without_header_rejected() {
        let middleware: BffMiddleware<()> = Default::default();

        let req = protected_post().body(()).unwrap();
        let endpoint = middleware.classify(&req).unwrap();

        assert!(matches!(
            verify(endpoint, &middleware.anti_forgery, &req),
            Err(ProtectionError::MissingHeader(_))
        ));
    }

    #[test]
    fn test_protected_request_with_header_allowed() {
        let middleware: BffMiddleware<()> = Default::default();

        for method in ["GET", "POST", "PUT", "DELETE", "PATCH"] {
            let req = protected_post()
                .method(method)
                .header("x-csrf", "1")
                .body(())
                .unwrap();
            let endpoint = middleware.classify(&req).unwrap();

            assert!(verify(endpoint, &middleware.anti_forgery, &req).is_ok());
        }
    }

    #[test]
    fn test_safe_methods_are_not_exempt() {
        let middleware: BffMiddleware<()> = Default::default();

        let req = protected_post().method("GET").body(()).unwrap();
        let endpoint = middleware.classify(&req).unwrap();

        assert!(verify(endpoint, &middleware.anti_forgery, &req).is_err());
    }

    #[test]
    fn test_skip_anti_forgery_check_allowed() {
        let req = Request::builder().method("POST").body(()).unwrap();
        let endpoint = Endpoint::protected_api().skip_anti_forgery_check();

        assert!(verify(endpoint, &AntiForgeryOptions::default(), &req).is_ok());
    }

    #[test]
    fn test_custom_header() {
        let options = AntiForgeryOptions::new("x-requested-with", "XMLHttpRequest").unwrap();
        let endpoint = Endpoint::protected_api();

        let req = protected_post().header("x-csrf", "1").body(()).unwrap();
        assert!(verify(endpoint, &options, &req).is_err());

        let req = protected_post()
            .header("x-requested-with", "XMLHttpRequest")
            .body(())
            .unwrap();
        assert!(verify(endpoint, &options, &req).is_ok());
    }

    #[test]
    fn test_resolver_overrides_extensions() {
        let middleware = BffLayer::default()
            .with_resolver(|_, uri| {
                uri.path()
                    .starts_with("/api/")
                    .then(Endpoint::protected_api)
            })
            .layer(());

        let req = Request::builder()
            .uri("/api/items")
            .body(())
            .unwrap();
        assert_eq!(middleware.classify(&req), Some(Endpoint::protected_api()));

        let req = protected_post().uri("/login").body(()).unwrap();
        assert_eq!(middleware.classify(&req), None);
    }

    #[test]
    fn test_rewrite_challenge() {
        let mut res = Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, "https://idp.example.com/authorize")
            .header(SET_COOKIE, "nonce=abc")
            .header(SET_COOKIE, "correlation=def")
            .header("content-type", "text/plain")
            .body(())
            .unwrap();

        assert!(rewrite_challenge(&mut res));
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().get(LOCATION).is_none());
        assert!(res.headers().get(SET_COOKIE).is_none());
        assert_eq!(
            res.headers().get("content-type"),
            Some(&HeaderValue::from_static("text/plain"))
        );
    }

    #[test]
    fn test_rewrite_only_touches_found() {
        for status in [
            StatusCode::OK,
            StatusCode::MOVED_PERMANENTLY,
            StatusCode::SEE_OTHER,
            StatusCode::TEMPORARY_REDIRECT,
            StatusCode::FORBIDDEN,
        ] {
            let mut res = Response::builder()
                .status(status)
                .header(LOCATION, "/elsewhere")
                .body(())
                .unwrap();

            assert!(!rewrite_challenge(&mut res));
            assert_eq!(res.status(), status);
            assert!(res.headers().get(LOCATION).is_some());
        }
    }

    #[test]
    fn test_status_response() {
        let res: Response<String> = status_response(StatusCode::UNAUTHORIZED);

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.body().is_empty());
    }
}

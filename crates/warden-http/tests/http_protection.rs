//! Protected routes served through axum

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Form, Query};
use axum::http::{header, request, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::{any, get, post};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use warden_auth::{
    AuthConfig, AuthResult, Authenticatable, MemorySessionBackend, ProtectionEngine,
    ProtectionPolicy, UserRepository,
};
use warden_http::{protect, with_session, AuthSession, AuthState, CurrentUser, HttpError};

#[derive(Debug, Clone)]
struct User {
    id: u64,
    login: String,
    roles: Vec<String>,
}

impl Authenticatable for User {
    type Id = u64;

    fn id(&self) -> &u64 {
        &self.id
    }

    fn roles(&self) -> Vec<String> {
        self.roles.clone()
    }
}

#[derive(Default)]
struct Users {
    rows: RwLock<HashMap<u64, User>>,
}

impl Users {
    fn insert(&self, id: u64, login: &str, roles: &[&str]) {
        let user = User {
            id,
            login: login.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        };
        self.rows.write().unwrap().insert(id, user);
    }
}

#[async_trait]
impl UserRepository for Users {
    type User = User;

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<User>> {
        let Ok(id) = id.parse::<u64>() else {
            return Ok(None);
        };
        Ok(self.rows.read().unwrap().get(&id).cloned())
    }
}

async fn login(
    session: AuthSession<Users>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<&'static str, HttpError> {
    let id = params.get("id").cloned().unwrap_or_default();
    match session.engine().identity().repository().find_by_id(&id).await? {
        Some(user) => {
            session.login(&user).await?;
            Ok("signed in")
        }
        None => Err(HttpError::Unauthenticated),
    }
}

async fn logout(session: AuthSession<Users>) -> Result<&'static str, HttpError> {
    session.logout().await?;
    Ok("signed out")
}

async fn get_token(session: AuthSession<Users>) -> Result<String, HttpError> {
    Ok(session.csrf_token().await?)
}

async fn whoami(CurrentUser(user): CurrentUser<User>) -> String {
    user.login
}

async fn admin(CurrentUser(user): CurrentUser<User>) -> String {
    format!("admin: {}", user.login)
}

async fn update(Form(form): Form<HashMap<String, String>>) -> String {
    form.get("note").cloned().unwrap_or_default()
}

async fn done() -> &'static str {
    "done"
}

fn app() -> Router {
    let users = Arc::new(Users::default());
    users.insert(1, "meh", &[]);
    users.insert(2, "root", &["admin"]);

    let engine = ProtectionEngine::new(Arc::new(AuthConfig::default()), users).unwrap();
    let state = AuthState::new(Arc::new(engine), Arc::new(MemorySessionBackend::default()));

    let authenticated = state.guard(ProtectionPolicy::authenticated());
    let admin_only = state.guard(ProtectionPolicy::builder().role("admin").build().unwrap());
    let users_sign_in = state.guard(
        ProtectionPolicy::builder()
            .sign_in_url("/users/sign-in/")
            .build()
            .unwrap(),
    );
    let force = state.guard(ProtectionPolicy::builder().force_csrf().build().unwrap());
    let disabled = state.guard(ProtectionPolicy::builder().without_csrf().build().unwrap());
    let echo_next = state.guard(
        ProtectionPolicy::builder()
            .sign_in_with(|ctx| {
                format!("/login?next={}", ctx.query.get("next").cloned().unwrap_or_default())
            })
            .build()
            .unwrap(),
    );

    Router::new()
        .route("/login", get(login))
        .route("/logout", get(logout))
        .route("/gettoken", get(get_token))
        .route(
            "/me",
            get(whoami).layer(from_fn_with_state(authenticated.clone(), protect::<Users>)),
        )
        .route(
            "/admin",
            get(admin).layer(from_fn_with_state(admin_only, protect::<Users>)),
        )
        .route(
            "/update",
            post(update).layer(from_fn_with_state(authenticated, protect::<Users>)),
        )
        .route(
            "/delete",
            any(done).layer(from_fn_with_state(force, protect::<Users>)),
        )
        .route(
            "/whatever",
            post(done).layer(from_fn_with_state(disabled, protect::<Users>)),
        )
        .route(
            "/members",
            get(done).layer(from_fn_with_state(users_sign_in, protect::<Users>)),
        )
        .route(
            "/echo",
            get(done).layer(from_fn_with_state(echo_next, protect::<Users>)),
        )
        .layer(from_fn_with_state(state, with_session::<Users>))
}

/// Browser-like client that keeps the session cookie
struct Client {
    app: Router,
    cookie: Option<String>,
}

impl Client {
    fn new(app: &Router) -> Self {
        Self {
            app: app.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, builder: request::Builder, body: Body) -> Response {
        let builder = match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        };
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(value) = response.headers().get(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::get(uri), Body::empty()).await
    }

    async fn post(&mut self, uri: &str) -> Response {
        self.send(Request::post(uri), Body::empty()).await
    }

    async fn post_form(&mut self, uri: &str, form: &str) -> Response {
        let builder = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(builder, Body::from(form.to_string())).await
    }

    async fn sign_in(&mut self, id: u64) {
        let response = self.get(&format!("/login?id={}", id)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn token(&mut self) -> String {
        let response = self.get("/gettoken").await;
        assert_eq!(response.status(), StatusCode::OK);
        text(response).await
    }
}

async fn text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn anonymous_requests_are_redirected() {
    let app = app();
    let mut client = Client::new(&app);

    for uri in ["/me", "/admin"] {
        let response = client.get(uri).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/sign-in/"));
    }

    // CSRF never runs before identity
    let response = client.post("/update").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn route_sign_in_url_overrides_default() {
    let app = app();
    let response = Client::new(&app).get("/members").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/users/sign-in/"));
}

#[tokio::test]
async fn computed_sign_in_url_with_control_bytes_falls_back() {
    let app = app();
    let mut client = Client::new(&app);

    let response = client.get("/echo?next=/admin").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?next=/admin"));

    for uri in ["/echo?next=%0d%0aX", "/echo?next=%0aSet-Cookie:%20a=b", "/echo?next=%00"] {
        let response = client.get(uri).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&response), Some("/sign-in/"), "{}", uri);
    }
}

#[tokio::test]
async fn session_cookie_is_issued_once() {
    let app = app();
    let mut client = Client::new(&app);

    let first = client.get("/me").await;
    let cookie = first.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("warden_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let second = client.get("/me").await;
    assert!(second.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn unknown_session_cookie_is_replaced() {
    let app = app();
    let mut client = Client::new(&app);
    client.cookie = Some("warden_session=forged".to_string());

    let response = client.get("/me").await;
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("warden_session="));
    assert!(!cookie.starts_with("warden_session=forged"));
}

#[tokio::test]
async fn login_and_logout_toggle_access() {
    let app = app();
    let mut client = Client::new(&app);

    client.sign_in(1).await;
    let response = client.get("/me").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "meh");

    client.get("/logout").await;
    let response = client.get("/me").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn unknown_user_cannot_sign_in() {
    let app = app();
    let response = Client::new(&app).get("/login?id=99").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_requires_role() {
    let app = app();

    let mut plain = Client::new(&app);
    plain.sign_in(1).await;
    let response = plain.get("/admin").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/sign-in/"));

    let mut root = Client::new(&app);
    root.sign_in(2).await;
    let response = root.get("/admin").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "admin: root");
}

#[tokio::test]
async fn post_requires_token_in_auto_mode() {
    let app = app();
    let mut client = Client::new(&app);
    client.sign_in(1).await;

    let response = client.post_form("/update", "note=hi").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = client.token().await;
    assert_eq!(token.len(), 43);

    // Form field; the handler still sees the full body
    let response = client
        .post_form("/update", &format!("_csrf_token={}&note=hi", token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "hi");

    // Query string
    let response = client
        .post_form(&format!("/update?_csrf_token={}", token), "note=q")
        .await;
    assert_eq!(text(response).await, "q");

    // Header
    let builder = Request::post("/update")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("X-CSRFToken", &token);
    let response = client.send(builder, Body::from("note=h")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "h");
}

#[tokio::test]
async fn force_mode_checks_safe_methods() {
    let app = app();
    let mut client = Client::new(&app);
    client.sign_in(1).await;

    assert_eq!(client.get("/delete").await.status(), StatusCode::FORBIDDEN);

    let token = client.token().await;
    let response = client.get(&format!("/delete?_csrf_token={}", token)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_mode_skips_the_check() {
    let app = app();
    let mut client = Client::new(&app);
    client.sign_in(1).await;

    let response = client.post("/whatever").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "done");
}

#[tokio::test]
async fn token_is_bound_to_its_session() {
    let app = app();

    let mut alice = Client::new(&app);
    alice.sign_in(1).await;
    let alice_token = alice.token().await;

    let mut mallory = Client::new(&app);
    mallory.sign_in(2).await;
    mallory.token().await;

    let response = mallory
        .post_form("/update", &format!("_csrf_token={}&note=x", alice_token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = app();
    let mut client = Client::new(&app);
    client.sign_in(1).await;
    let token = client.token().await;

    client.get("/logout").await;
    client.sign_in(1).await;

    let response = client
        .post_form("/update", &format!("_csrf_token={}&note=x", token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

//! Protected application example
//!
//! Serves a small app with a sign-in page, an admin area guarded by a role
//! and a form that requires a CSRF token.
//!
//! ```text
//! cargo run -p warden-http --example protected_app
//! curl -c jar -b jar 'http://127.0.0.1:3000/login?id=1'
//! curl -c jar -b jar 'http://127.0.0.1:3000/admin'
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Form, Query};
use axum::middleware::from_fn_with_state;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use warden_auth::{
    AuthConfig, AuthResult, Authenticatable, MemorySessionBackend, ProtectionEngine,
    ProtectionPolicy, TracingNotifier, UserRepository,
};
use warden_http::{protect, with_session, AuthSession, AuthState, CurrentUser, HttpResult};

#[derive(Debug, Clone)]
struct Account {
    id: u32,
    email: String,
    roles: Vec<String>,
}

impl Authenticatable for Account {
    type Id = u32;

    fn id(&self) -> &u32 {
        &self.id
    }

    fn roles(&self) -> Vec<String> {
        self.roles.clone()
    }

    fn email(&self) -> Option<&str> {
        Some(&self.email)
    }
}

/// Fixed set of accounts
struct Accounts(HashMap<u32, Account>);

#[async_trait]
impl UserRepository for Accounts {
    type User = Account;

    async fn find_by_id(&self, id: &str) -> AuthResult<Option<Account>> {
        Ok(id.parse().ok().and_then(|id: u32| self.0.get(&id).cloned()))
    }
}

async fn login(
    session: AuthSession<Accounts>,
    Query(params): Query<HashMap<String, String>>,
) -> HttpResult<String> {
    let id = params.get("id").map(String::as_str).unwrap_or_default();
    let Some(account) = session.engine().identity().repository().find_by_id(id).await? else {
        return Ok("no such account".to_string());
    };

    session.login(&account).await?;
    session
        .engine()
        .notify(&account, "New sign-in", "Your account was just used to sign in.")
        .await;
    Ok(format!("signed in as {}", account.email))
}

async fn logout(session: AuthSession<Accounts>) -> HttpResult<&'static str> {
    session.logout().await?;
    Ok("signed out")
}

async fn sign_in_page() -> &'static str {
    "sign in with /login?id=1"
}

async fn admin(CurrentUser(account): CurrentUser<Account>, session: AuthSession<Accounts>) -> HttpResult<Html<String>> {
    let token = session.csrf_token().await?;
    Ok(Html(format!(
        r#"<p>Welcome {}</p>
<form method="post" action="/admin/notes">
  <input type="hidden" name="_csrf_token" value="{}">
  <input name="note"><button>Save</button>
</form>"#,
        account.email, token
    )))
}

async fn save_note(Form(form): Form<HashMap<String, String>>) -> String {
    format!("saved: {}", form.get("note").cloned().unwrap_or_default())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let accounts = Accounts(HashMap::from([
        (
            1,
            Account {
                id: 1,
                email: "admin@example.com".to_string(),
                roles: vec!["admin".to_string()],
            },
        ),
        (
            2,
            Account {
                id: 2,
                email: "viewer@example.com".to_string(),
                roles: vec![],
            },
        ),
    ]));

    let engine = ProtectionEngine::new(Arc::new(AuthConfig::development()), Arc::new(accounts))?
        .with_notifier(Arc::new(TracingNotifier));
    let state = AuthState::new(Arc::new(engine), Arc::new(MemorySessionBackend::default()));
    let admin_only = state.guard(ProtectionPolicy::builder().role("admin").build()?);

    let app = Router::new()
        .route("/sign-in/", get(sign_in_page))
        .route("/login", get(login))
        .route("/logout", get(logout))
        .route(
            "/admin",
            get(admin).layer(from_fn_with_state(admin_only.clone(), protect::<Accounts>)),
        )
        .route(
            "/admin/notes",
            axum::routing::post(save_note).layer(from_fn_with_state(admin_only, protect::<Accounts>)),
        )
        .layer(from_fn_with_state(state, with_session::<Accounts>));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

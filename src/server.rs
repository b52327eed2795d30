use std::{fs, io, path::Path as FsPath, sync::Arc};

use anyhow::Context as _;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    response::{Html, Redirect},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tera::Tera;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;

use crate::{
    error::ApiError,
    pipeline, registry,
    site::Context,
    store::{self, Store},
};

#[derive(Clone)]
pub struct AppState {
    context: Arc<Context>,
    tera: Arc<Tera>,
    store: Store,
    // one writer at a time: every mutate-then-regenerate sequence holds this
    write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(context: Arc<Context>, tera: Arc<Tera>) -> Self {
        let store = Store::new(context.data_dir());
        Self {
            context,
            tera,
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// The one document with an enforced shape. Collections stay opaque.
#[derive(Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub tagline: String,
    pub about: String,
    pub avatar_url: String,
    pub github_link: String,
    pub linkedin_link: String,
}

pub fn router(state: AppState) -> Router {
    let assets_dir = state.context.assets_dir();

    Router::new()
        .route("/", get(home))
        .route("/work", get(work))
        .route("/blogs", get(blogs))
        .route("/tweets", get(tweets))
        .route("/admin", get(admin))
        .route("/index.html", get(|| async { Redirect::permanent("/") }))
        .route("/work.html", get(|| async { Redirect::permanent("/work") }))
        .route("/blogs.html", get(|| async { Redirect::permanent("/blogs") }))
        .route("/tweets.html", get(|| async { Redirect::permanent("/tweets") }))
        .route("/api/save/profile", post(save_profile))
        .route("/api/save/:collection", post(save_collection))
        .route("/api/upload", post(upload))
        .route("/api/upload/avatar", post(upload_avatar))
        .nest_service("/assets", ServeDir::new(assets_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- Public pages ---

fn live_context(
    state: &AppState,
    active_page: &str,
    path: &str,
    bindings: &[(&str, &str)],
) -> anyhow::Result<tera::Context> {
    let store = &state.store;
    let mut ctx = tera::Context::new();
    ctx.insert("profile", &store.load(store::PROFILE)?);
    ctx.insert("navigation", &store.load(store::NAVIGATION)?);
    ctx.insert("active_page", active_page);
    ctx.insert("base_url", &state.context.config.base_url);
    ctx.insert("permalink", &state.context.config.page_url(path)?);
    for (key, document) in bindings {
        ctx.insert(*key, &store.load(document)?);
    }
    Ok(ctx)
}

async fn home(state: State<AppState>) -> Result<Html<String>, ApiError> {
    page(state, "index").await
}

async fn work(state: State<AppState>) -> Result<Html<String>, ApiError> {
    page(state, "work").await
}

async fn blogs(state: State<AppState>) -> Result<Html<String>, ApiError> {
    page(state, "blogs").await
}

async fn tweets(state: State<AppState>) -> Result<Html<String>, ApiError> {
    page(state, "tweets").await
}

async fn page(
    State(state): State<AppState>,
    active_page: &'static str,
) -> Result<Html<String>, ApiError> {
    let spec = registry::find(active_page)
        .ok_or_else(|| anyhow::anyhow!("no registered page tagged {active_page}"))
        .map_err(ApiError::from)?;

    let ctx = live_context(&state, spec.active_page, spec.output, spec.bindings)?;
    let html = state
        .tera
        .render(spec.template, &ctx)
        .with_context(|| format!("rendering {}", spec.template))?;

    Ok(Html(html))
}

async fn admin(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let ctx = live_context(
        &state,
        "admin",
        "admin",
        &[
            ("projects", store::PROJECTS),
            ("blogs", store::BLOGS),
            ("tweets", store::TWEETS),
        ],
    )?;
    let html = state
        .tera
        .render("admin.html", &ctx)
        .context("rendering admin.html")?;

    Ok(Html(html))
}

// --- Mutation API ---

async fn save_profile(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> Result<Json<Value>, ApiError> {
    let document = serde_json::to_value(&profile).map_err(anyhow::Error::from)?;

    let _guard = state.write_lock.lock().await;
    state.store.save(store::PROFILE, &document)?;
    pipeline::regenerate(&state.context, &state.tera, &state.store)?;

    Ok(Json(json!({"status": "success"})))
}

async fn save_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(records): Json<Vec<Value>>,
) -> Result<Json<Value>, ApiError> {
    let name = match collection.as_str() {
        "blogs" => store::BLOGS,
        "projects" => store::PROJECTS,
        "tweets" => store::TWEETS,
        other => {
            return Err(ApiError::BadRequest(format!("unknown collection {other:?}")));
        }
    };

    let _guard = state.write_lock.lock().await;
    state.store.save(name, &Value::Array(records))?;
    pipeline::regenerate(&state.context, &state.tera, &state.store)?;

    Ok(Json(json!({"status": "success"})))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (original, data) = read_file_field(&mut multipart).await?;

    let filename = format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), original);
    let path = state.context.assets_dir().join("uploads").join(&filename);
    store::write_atomic(&path, &data)?;

    info!(file = %filename, bytes = data.len(), "stored upload");

    Ok(Json(json!({
        "url": format!("/assets/uploads/{filename}"),
        "filename": filename,
    })))
}

async fn upload_avatar(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (original, data) = read_file_field(&mut multipart).await?;

    let extension = FsPath::new(&original)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();
    let filename = format!("avatar.{extension}");
    let url = format!("/assets/img/{filename}");
    let img_dir = state.context.assets_dir().join("img");

    let _guard = state.write_lock.lock().await;

    // a previous avatar may carry a different extension; clear them all
    remove_stale_avatars(&img_dir).map_err(anyhow::Error::from)?;
    store::write_atomic(&img_dir.join(&filename), &data)?;

    // fold the new URL into the profile; an absent profile loads as `[]`
    let mut profile = match state.store.load(store::PROFILE)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    profile.insert("avatar_url".to_string(), Value::String(url.clone()));
    state.store.save(store::PROFILE, &Value::Object(profile))?;

    pipeline::regenerate(&state.context, &state.tera, &state.store)?;

    Ok(Json(json!({"url": url})))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.file_name() else {
            continue;
        };

        // clients may send a full path; keep only the final component
        let name = FsPath::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        return Ok((name, data));
    }

    Err(ApiError::BadRequest("missing file field".to_string()))
}

fn remove_stale_avatars(img_dir: &FsPath) -> io::Result<()> {
    let entries = match fs::read_dir(img_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let path = entry?.path();
        if path.file_stem().map_or(false, |stem| stem == "avatar") {
            fs::remove_file(&path)?;
        }
    }

    Ok(())
}

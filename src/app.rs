use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::aliases::{FieldTable, MappingResult};
use crate::config::Config;
use crate::error::{LeadError, Result};
use crate::loader::{self, SheetFormat};
use crate::mapper::{MappingSelection, map_rows};
use crate::runs::{RunStatus, get_run_status};
use crate::sessions::{Identity, SessionRegistry, require_auth};
use crate::store::{JsonStore, LeadRow, LeadSheet, LeadStore, owned_lead_sheet};

pub struct AppState {
    pub store: Arc<dyn LeadStore>,
    pub sessions: Arc<SessionRegistry>,
    pub fields: FieldTable,
}

#[derive(Deserialize)]
struct SuggestRequest {
    headers: Vec<String>,
}

#[derive(Serialize)]
struct HeadersResponse {
    headers: Vec<String>,
    suggestions: MappingResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportSummary {
    id: String,
    name: String,
    headers: Vec<String>,
    row_count: usize,
}

struct Upload {
    filename: String,
    format: SheetFormat,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct ImportForm {
    file: Option<Upload>,
    name: Option<String>,
    mapping: MappingSelection,
}

pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let fields = match &config.fields_file {
        Some(path) => FieldTable::from_json_file(path)?,
        None => FieldTable::builtin(),
    };
    let store = JsonStore::init(&config.data_dir)?;
    let sessions = SessionRegistry::from_file(config.sessions_path())?;

    let app_state = Arc::new(AppState {
        store: Arc::new(store),
        sessions: Arc::new(sessions),
        fields,
    });
    let app = router(app_state, config.max_upload_bytes);

    // Start server
    let listener = TcpListener::bind(config.bind).await?;
    log::info!("listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .route("/fields", get(list_fields))
        .route("/mapping/suggest", post(suggest_mapping))
        .route("/uploads/headers", post(upload_headers))
        .route("/leads", post(import_leads))
        .route("/leads/:sheet_id", get(get_lead_sheet))
        .route("/leads/:sheet_id/runs/:run_id", get(get_run))
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn list_fields(State(state): State<Arc<AppState>>) -> Json<FieldTable> {
    Json(state.fields.clone())
}

async fn suggest_mapping(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SuggestRequest>,
) -> Json<MappingResult> {
    Json(state.fields.suggest(&payload.headers))
}

async fn upload_headers(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<HeadersResponse>> {
    let upload = read_form(multipart)
        .await?
        .file
        .ok_or_else(|| LeadError::InvalidInput("missing file".into()))?;

    let response = blocking(move || {
        let headers = loader::parse(&upload.bytes, upload.format)?.headers;
        let suggestions = state.fields.suggest(&headers);
        Ok(HeadersResponse {
            headers,
            suggestions,
        })
    })
    .await?;
    Ok(Json(response))
}

async fn import_leads(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ImportSummary>)> {
    let form = read_form(multipart).await?;
    let upload = form
        .file
        .ok_or_else(|| LeadError::InvalidInput("missing file".into()))?;

    let name = form
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| upload.filename.clone());
    let user_id = identity.user_id.clone();
    let sheet = blocking(move || {
        let parsed = loader::parse(&upload.bytes, upload.format)?;
        let records = map_rows(&state.fields, &parsed, &form.mapping);

        let mut sheet = LeadSheet::new(&user_id, &name, parsed.headers);
        sheet.rows = records.into_iter().map(LeadRow::new).collect();
        state.store.insert_lead_sheet(&sheet)?;
        Ok(sheet)
    })
    .await?;

    log::info!(
        "user {} imported lead sheet {} ({} rows)",
        identity.user_id,
        sheet.id,
        sheet.rows.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(ImportSummary {
            row_count: sheet.rows.len(),
            id: sheet.id,
            name: sheet.name,
            headers: sheet.headers,
        }),
    ))
}

async fn get_lead_sheet(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(sheet_id): Path<String>,
) -> Result<Json<LeadSheet>> {
    let sheet =
        blocking(move || owned_lead_sheet(state.store.as_ref(), &sheet_id, &identity.user_id))
            .await?;
    Ok(Json(sheet))
}

async fn get_run(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((sheet_id, run_id)): Path<(String, String)>,
) -> Result<Json<RunStatus>> {
    let status = blocking(move || {
        get_run_status(state.store.as_ref(), &sheet_id, &run_id, &identity.user_id)
    })
    .await?;
    Ok(Json(status))
}

// Parsing and the file-backed store both block; keep them off the runtime
// worker threads.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| LeadError::Internal(format!("blocking task failed: {e}")))?
}

// Collect the multipart fields of an upload form. The extension gate runs
// before the file body is read.
async fn read_form(mut multipart: Multipart) -> Result<ImportForm> {
    let mut form = ImportForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| LeadError::InvalidInput(e.to_string()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| LeadError::InvalidInput("file has no filename".into()))?;
                let format = SheetFormat::from_filename(&filename)?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| LeadError::InvalidInput(e.to_string()))?
                    .to_vec();
                form.file = Some(Upload {
                    filename,
                    format,
                    bytes,
                });
            }
            "name" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| LeadError::InvalidInput(e.to_string()))?;
                form.name = Some(text);
            }
            "mapping" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| LeadError::InvalidInput(e.to_string()))?;
                if !text.trim().is_empty() {
                    form.mapping = serde_json::from_str(&text)
                        .map_err(|e| LeadError::InvalidInput(format!("invalid mapping: {e}")))?;
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

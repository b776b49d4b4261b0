use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Form, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::Local;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::json;
use crate::core::Verdict;
use crate::export::{export_attendance, ClassNames};
use crate::notify::AbsenceNotice;
use crate::service::error::AppError;
use crate::service::session::{Session, SessionKeys};
use crate::service::state::AppState;
use crate::storage::{
    AttendanceStore, ClassSelection, DailyRoll, Group, NewAttendance, Section, Status, Student, Subject,
};

type HandlerResult = Result<Response, AppError>;

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Attendance login</title></head>
<body>
  <form method="post" action="/login">
    <label>Username <input name="username" autocomplete="username"></label>
    <label>Password <input name="password" type="password" autocomplete="current-password"></label>
    <button type="submit">Log in</button>
  </form>
</body>
</html>
"#;

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Fields arrive as strings from `<select>` elements and may be blank.
#[derive(Deserialize)]
pub struct SelectionForm {
    pub section: Option<String>,
    pub group: Option<String>,
    pub subject: Option<String>,
}

#[derive(Deserialize)]
pub struct MarkRequest {
    /// Browsers send the id from a `data-` attribute, so it may be a string.
    #[serde(deserialize_with = "id_or_numeric_string")]
    pub student_id: i64,
    pub status: String,
    #[serde(default)]
    pub image_data: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

fn id_or_numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid student id {:?}", text))),
    }
}

#[derive(Serialize)]
pub struct GroupOption {
    pub id: i64,
    pub name: String,
}

/// The selected class, resolved to its rows.
struct ClassContext {
    selection: ClassSelection,
    section: Section,
    group: Group,
    subject: Subject,
}

impl ClassContext {
    fn load(store: &AttendanceStore, selection: ClassSelection) -> Result<Option<Self>, AppError> {
        let section = store.section(selection.section_id)?;
        let group = store.group(selection.group_id)?;
        let subject = store.subject(selection.subject_id)?;

        Ok(match (section, group, subject) {
            (Some(section), Some(group), Some(subject)) => Some(Self { selection, section, group, subject }),
            _ => None,
        })
    }

    fn names(&self) -> ClassNames<'_> {
        ClassNames {
            section: &self.section.name,
            group: &self.group.name,
            subject: &self.subject.name,
        }
    }
}

fn with_session(response: impl IntoResponse, keys: &SessionKeys, session: &Session) -> HandlerResult {
    let cookie = keys
        .set_cookie(session)
        .ok_or_else(|| AppError::Internal("failed to sign session cookie".into()))?;

    let mut response = response.into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// The selected class for a logged-in session, `None` if either is missing.
fn selected_class(state: &AppState, session: Option<Session>) -> Result<Option<ClassContext>, AppError> {
    let Some(selection) = session.and_then(|s| s.selection) else {
        return Ok(None);
    };
    let store = state.store()?;
    ClassContext::load(&store, selection)
}

pub async fn index() -> Redirect {
    Redirect::to("/login")
}

pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

pub async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> HandlerResult {
    let user_id = state.store()?.verify_login(&form.username, &form.password)?;

    match user_id {
        Some(user_id) => {
            tracing::info!("Login successful for {}", form.username);
            with_session(Redirect::to("/selection"), &state.sessions, &Session::new(user_id))
        }
        None => {
            tracing::warn!("Failed login attempt for {}", form.username);
            Err(AppError::Unauthorized("Invalid username or password".into()))
        }
    }
}

pub async fn logout() -> Response {
    let mut response = Redirect::to("/login").into_response();
    if let Some(cookie) = SessionKeys::clear_cookie() {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

pub async fn selection_options(State(state): State<Arc<AppState>>, headers: HeaderMap) -> HandlerResult {
    if state.sessions.from_headers(&headers).is_none() {
        return Ok(Redirect::to("/login").into_response());
    }

    let store = state.store()?;
    let sections = store.sections()?;
    let subjects = store.subjects()?;
    Ok(Json(json!({ "sections": sections, "subjects": subjects })).into_response())
}

pub async fn select_class(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<SelectionForm>,
) -> HandlerResult {
    let Some(mut session) = state.sessions.from_headers(&headers) else {
        return Ok(Redirect::to("/login").into_response());
    };

    let parse = |field: &Option<String>| field.as_deref().and_then(|v| v.trim().parse::<i64>().ok());
    let (Some(section_id), Some(group_id), Some(subject_id)) =
        (parse(&form.section), parse(&form.group), parse(&form.subject))
    else {
        return Err(AppError::BadRequest("Please select all required fields".into()));
    };

    let selection = ClassSelection { section_id, group_id, subject_id };
    let class = {
        let store = state.store()?;
        ClassContext::load(&store, selection)?
    }
    .ok_or_else(|| AppError::BadRequest("Invalid selection".into()))?;
    if class.group.section_id != class.section.id {
        return Err(AppError::BadRequest(format!(
            "Group {} is not part of section {}", class.group.name, class.section.name
        )));
    }

    session.selection = Some(selection);
    with_session(Redirect::to("/attendance"), &state.sessions, &session)
}

pub async fn get_groups(State(state): State<Arc<AppState>>, Path(section_id): Path<i64>) -> HandlerResult {
    let groups: Vec<GroupOption> = state
        .store()?
        .groups_for_section(section_id)?
        .into_iter()
        .map(|g| GroupOption { id: g.id, name: g.name })
        .collect();
    Ok(Json(groups).into_response())
}

pub async fn attendance_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> HandlerResult {
    let session = state.sessions.from_headers(&headers);
    let Some(class) = selected_class(&state, session)? else {
        return Ok(Redirect::to("/selection").into_response());
    };
    let students = state.store()?.students()?;

    // Directory listing and hashing stay off the async workers
    let verifier = state.verifier.clone();
    let known = tokio::task::spawn_blocking(move || verifier.load_store())
        .await
        .map_err(|e| AppError::Internal(format!("fingerprint load task failed: {}", e)))?;

    let names: Vec<&str> = known.names().collect();
    let encodings: Vec<&Vec<f32>> = known.iter().map(|i| &i.encoding).collect();

    Ok(Json(json!({
        "section": class.section,
        "group": class.group,
        "subject": class.subject,
        "students": students,
        "known_faces": { "names": names, "encodings": encodings },
    }))
    .into_response())
}

pub async fn process_attendance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Result<Json<MarkRequest>, JsonRejection>,
) -> HandlerResult {
    let Some(session) = state.sessions.from_headers(&headers) else {
        return Err(AppError::Unauthorized("Not logged in".into()));
    };
    let Json(request) = request.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let Some(class) = selected_class(&state, Some(session))? else {
        return Err(AppError::BadRequest("Please select all required fields".into()));
    };

    let student = state
        .store()?
        .student(request.student_id)?
        .ok_or_else(|| AppError::NotFound("Student not found".into()))?;
    let status: Status = request
        .status
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid status".into()))?;
    let today = Local::now().date_naive();

    match status {
        Status::Present => {
            let image_data = request.image_data.filter(|d| !d.trim().is_empty()).ok_or_else(|| {
                AppError::BadRequest("No image data provided for present student".into())
            })?;

            let verdict = verify_in_background(&state, image_data, student.name.clone()).await?;
            if !verdict.accepted {
                return Err(AppError::BadRequest(verdict.message));
            }
        }
        Status::Absent => notify_absence(&state, &student, &class, today).await,
    }

    let has_phone = student.phone_number.is_some();
    let entry = NewAttendance {
        student_id: student.id,
        class: class.selection,
        status,
        date: today,
        notification_sent: status == Status::Absent && has_phone,
    };
    if let Err(e) = state.store()?.record_attendance(&entry) {
        return Err(AppError::Internal(e.to_string()));
    }

    let mut message = format!("Attendance marked as {} for {}", status, student.name);
    if status == Status::Absent {
        if has_phone {
            message.push_str(". SMS notification sent.");
        } else {
            message.push_str(". No phone number available for SMS notification.");
        }
    }

    Ok(Json(json!({ "success": true, "message": message })).into_response())
}

async fn verify_in_background(state: &AppState, image_data: String, claimed: String) -> Result<Verdict, AppError> {
    let verifier = state.verifier.clone();
    tokio::task::spawn_blocking(move || verifier.verify(&image_data, &claimed))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))
}

/// Delivery failures are logged and never fail the request.
async fn notify_absence(
    state: &AppState,
    student: &Student,
    class: &ClassContext,
    date: chrono::NaiveDate,
) {
    if student.phone_number.is_none() {
        tracing::warn!("No phone number available for {}. SMS notification not sent.", student.name);
        return;
    }

    let notice = AbsenceNotice {
        student_name: student.name.clone(),
        phone_number: student.phone_number.clone(),
        subject_name: class.subject.name.clone(),
        section_name: class.section.name.clone(),
        group_name: class.group.name.clone(),
        date: date.format("%Y-%m-%d").to_string(),
    };

    let outcome = state.notifier.send_absence(&notice).await;
    if outcome.success {
        tracing::info!("SMS notification sent to {}", student.name);
    } else {
        tracing::warn!("Failed to send SMS to {}: {}", student.name, outcome.message);
    }
}

fn export_today(state: &AppState, class: &ClassContext) -> Result<(DailyRoll, String), AppError> {
    let roll = state.store()?.daily_roll(class.selection, Local::now().date_naive())?;
    let filename = export_attendance(&state.paths.csv_dir, &class.names(), &roll.present, &roll.absent)?;
    Ok((roll, filename))
}

pub async fn summary(State(state): State<Arc<AppState>>, headers: HeaderMap) -> HandlerResult {
    let session = state.sessions.from_headers(&headers);
    let Some(class) = selected_class(&state, session)? else {
        return Ok(Redirect::to("/selection").into_response());
    };

    let (roll, csv_filename) = export_today(&state, &class)?;

    Ok(Json(json!({
        "section": class.section,
        "group": class.group,
        "subject": class.subject,
        "present_students": roll.present,
        "absent_students": roll.absent,
        "csv_filename": csv_filename,
        "current_date": Local::now().format("%Y-%m-%d").to_string(),
    }))
    .into_response())
}

pub async fn export_csv(State(state): State<Arc<AppState>>, headers: HeaderMap) -> HandlerResult {
    let Some(session) = state.sessions.from_headers(&headers) else {
        return Ok(Redirect::to("/login").into_response());
    };
    let Some(class) = selected_class(&state, Some(session))? else {
        return Err(AppError::BadRequest("Please select all required fields".into()));
    };

    let (_, filename) = export_today(&state, &class)?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "filename": filename }))).into_response())
}

//! In-process stand-in for the catalog backend
//!
//! Implements the REST surface the client consumes, with FastAPI-style
//! `{"detail": ...}` error bodies and HS256 bearer tokens.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SECRET: &[u8] = b"integration-secret";

pub const ADMIN_EMAIL: &str = "admin@library.test";
pub const ADMIN_PASSWORD: &str = "admin-pass";
pub const READER_EMAIL: &str = "reader@library.test";
pub const READER_PASSWORD: &str = "reader-pass";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    is_admin: bool,
    exp: usize,
}

#[derive(Clone)]
struct StoredUser {
    id: String,
    name: String,
    email: String,
    password: String,
    is_admin: bool,
}

impl StoredUser {
    fn to_json(&self) -> Value {
        json!({"id": self.id, "name": self.name, "email": self.email, "is_admin": self.is_admin})
    }
}

#[derive(Clone)]
struct StoredBook {
    id: String,
    title: String,
    author: Option<String>,
    description: Option<String>,
    category: Vec<String>,
    borrowed_by: Option<String>,
}

impl StoredBook {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "author": self.author,
            "description": self.description,
            "category": self.category,
            "status": if self.borrowed_by.is_some() { "borrowed" } else { "available" },
            "borrowed_by": self.borrowed_by,
        })
    }
}

#[derive(Default)]
struct Data {
    users: Vec<StoredUser>,
    books: Vec<StoredBook>,
    next_id: u64,
}

impl Data {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// Handle on the running stub
#[derive(Clone)]
pub struct Backend {
    data: Arc<Mutex<Data>>,
    requests: Arc<AtomicUsize>,
}

impl Backend {
    /// Requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn user_id(&self, email: &str) -> String {
        let data = self.data.lock().unwrap();
        data.users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.id.clone())
            .expect("seeded user")
    }

    pub fn user_count(&self) -> usize {
        self.data.lock().unwrap().users.len()
    }

    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

type Failure = (StatusCode, Json<Value>);

fn fail(status: StatusCode, detail: &str) -> Failure {
    (status, Json(json!({ "detail": detail })))
}

fn claims(headers: &HeaderMap) -> Result<Claims, Failure> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Not authenticated"))?;

    decode::<Claims>(token, &DecodingKey::from_secret(SECRET), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| fail(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
}

fn admin_claims(headers: &HeaderMap) -> Result<Claims, Failure> {
    let claims = claims(headers)?;
    if claims.is_admin {
        Ok(claims)
    } else {
        Err(fail(StatusCode::FORBIDDEN, "Not enough permissions"))
    }
}

/// Start the stub on an ephemeral port; returns its base URL
pub async fn spawn() -> (String, Backend) {
    let mut data = Data::default();
    for (name, email, password, is_admin) in [
        ("Admin", ADMIN_EMAIL, ADMIN_PASSWORD, true),
        ("Reader", READER_EMAIL, READER_PASSWORD, false),
    ] {
        let id = data.next_id();
        data.users.push(StoredUser {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            is_admin,
        });
    }
    for (title, author) in [
        ("Deep Learning", "Ian Goodfellow"),
        ("Python Machine Learning", "Sebastian Raschka"),
        ("The Rust Programming Language", "Steve Klabnik"),
    ] {
        let id = data.next_id();
        data.books.push(StoredBook {
            id,
            title: title.to_string(),
            author: Some(author.to_string()),
            description: None,
            category: vec!["Other".to_string()],
            borrowed_by: None,
        });
    }

    let backend = Backend {
        data: Arc::new(Mutex::new(data)),
        requests: Arc::new(AtomicUsize::new(0)),
    };

    let api = Router::new()
        .route("/users/login", post(login))
        .route("/users/register", post(register))
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/users/:id/books", get(user_books))
        .route("/books", get(list_books).post(create_book))
        .route("/books/:id", get(get_book).delete(delete_book))
        .route("/books/:id/borrow", post(borrow_book))
        .route("/books/:id/return", post(return_book))
        .with_state(backend.clone());

    let app = Router::new().nest("/api", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub backend");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub backend");
    });

    (format!("http://{}", addr), backend)
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(State(backend): State<Backend>, Form(form): Form<LoginForm>) -> Result<Json<Value>, Failure> {
    backend.hit();
    let data = backend.data.lock().unwrap();
    let user = data
        .users
        .iter()
        .find(|u| u.email == form.username && u.password == form.password)
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Incorrect email or password"))?;

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
        exp: 4_102_444_800,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
        .map_err(|_| fail(StatusCode::INTERNAL_SERVER_ERROR, "token"))?;

    Ok(Json(json!({ "access_token": token, "token_type": "bearer" })))
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
    #[serde(default)]
    is_admin: bool,
}

async fn register(State(backend): State<Backend>, Json(body): Json<RegisterBody>) -> Result<Json<Value>, Failure> {
    backend.hit();
    let mut data = backend.data.lock().unwrap();
    if data.users.iter().any(|u| u.email == body.email) {
        return Err(fail(StatusCode::BAD_REQUEST, "Email already registered"));
    }
    let user = StoredUser {
        id: data.next_id(),
        name: body.name,
        email: body.email,
        password: body.password,
        is_admin: body.is_admin,
    };
    data.users.push(user.clone());
    Ok(Json(user.to_json()))
}

async fn list_users(State(backend): State<Backend>, headers: HeaderMap) -> Result<Json<Value>, Failure> {
    backend.hit();
    admin_claims(&headers)?;
    let data = backend.data.lock().unwrap();
    let items: Vec<Value> = data.users.iter().map(StoredUser::to_json).collect();
    Ok(Json(json!({ "items": items, "total": items.len() })))
}

async fn get_user(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, Failure> {
    backend.hit();
    let claims = claims(&headers)?;
    if claims.sub != id && !claims.is_admin {
        return Err(fail(StatusCode::FORBIDDEN, "You can only access your own user information"));
    }
    let data = backend.data.lock().unwrap();
    data.users
        .iter()
        .find(|u| u.id == id)
        .map(|u| Json(u.to_json()))
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "User not found"))
}

#[derive(Deserialize)]
struct UpdateBody {
    name: Option<String>,
    is_admin: Option<bool>,
}

async fn update_user(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<Value>, Failure> {
    backend.hit();
    admin_claims(&headers)?;
    let mut data = backend.data.lock().unwrap();
    let user = data
        .users
        .iter_mut()
        .find(|u| u.id == id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "User not found"))?;
    if let Some(name) = body.name {
        user.name = name;
    }
    if let Some(is_admin) = body.is_admin {
        user.is_admin = is_admin;
    }
    Ok(Json(user.to_json()))
}

async fn delete_user(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    backend.hit();
    admin_claims(&headers)?;
    let mut data = backend.data.lock().unwrap();
    let before = data.users.len();
    data.users.retain(|u| u.id != id);
    if data.users.len() == before {
        return Err(fail(StatusCode::NOT_FOUND, "User not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn user_books(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, Failure> {
    backend.hit();
    claims(&headers)?;
    let data = backend.data.lock().unwrap();
    let books: Vec<&str> = data
        .books
        .iter()
        .filter(|b| b.borrowed_by.as_deref() == Some(id.as_str()))
        .map(|b| b.id.as_str())
        .collect();
    Ok(Json(json!({ "user_id": id, "books": books })))
}

#[derive(Deserialize)]
struct BookQuery {
    title: Option<String>,
}

async fn list_books(State(backend): State<Backend>, Query(query): Query<BookQuery>) -> Json<Value> {
    backend.hit();
    let data = backend.data.lock().unwrap();
    let term = query.title.map(|t| t.to_lowercase());
    let items: Vec<Value> = data
        .books
        .iter()
        .filter(|b| match &term {
            Some(term) => b.title.to_lowercase().contains(term),
            None => true,
        })
        .map(StoredBook::to_json)
        .collect();
    Json(json!({ "items": items, "total": items.len() }))
}

#[derive(Deserialize)]
struct CreateBookBody {
    id: Option<String>,
    title: String,
    author: Option<String>,
    description: Option<String>,
    category: Option<String>,
}

async fn create_book(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<CreateBookBody>,
) -> Result<Json<Value>, Failure> {
    backend.hit();
    admin_claims(&headers)?;
    let mut data = backend.data.lock().unwrap();
    let id = match body.id {
        Some(id) if data.books.iter().any(|b| b.id == id) => {
            return Err(fail(StatusCode::BAD_REQUEST, "Book id already exists"));
        }
        Some(id) => id,
        None => data.next_id(),
    };
    let book = StoredBook {
        id,
        title: body.title,
        author: body.author,
        description: body.description,
        category: body.category.into_iter().collect(),
        borrowed_by: None,
    };
    data.books.push(book.clone());
    Ok(Json(book.to_json()))
}

async fn get_book(State(backend): State<Backend>, Path(id): Path<String>) -> Result<Json<Value>, Failure> {
    backend.hit();
    let data = backend.data.lock().unwrap();
    data.books
        .iter()
        .find(|b| b.id == id)
        .map(|b| Json(b.to_json()))
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Book not found"))
}

#[derive(Deserialize)]
struct BorrowBody {
    user_id: String,
}

async fn borrow_book(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<BorrowBody>,
) -> Result<Json<Value>, Failure> {
    backend.hit();
    claims(&headers)?;
    let mut data = backend.data.lock().unwrap();
    let book = data
        .books
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Book not found"))?;
    if book.borrowed_by.is_some() {
        return Err(fail(StatusCode::BAD_REQUEST, "Book is not available for borrowing"));
    }
    book.borrowed_by = Some(body.user_id);
    Ok(Json(book.to_json()))
}

async fn return_book(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, Failure> {
    backend.hit();
    claims(&headers)?;
    let mut data = backend.data.lock().unwrap();
    let book = data
        .books
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Book not found"))?;
    if book.borrowed_by.is_none() {
        return Err(fail(StatusCode::BAD_REQUEST, "Book is not borrowed"));
    }
    book.borrowed_by = None;
    Ok(Json(book.to_json()))
}

async fn delete_book(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, Failure> {
    backend.hit();
    admin_claims(&headers)?;
    let mut data = backend.data.lock().unwrap();
    let before = data.books.len();
    data.books.retain(|b| b.id != id);
    if data.books.len() == before {
        return Err(fail(StatusCode::NOT_FOUND, "Book not found"));
    }
    Ok(Json(json!({ "message": "Book deleted" })))
}

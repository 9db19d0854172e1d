//! Catalog service
//!
//! Book listing, search and loans. The controller keeps the last book
//! view it fetched; every successful mutation is followed by a full re-fetch
//! (of the active search, if any) and the view is replaced wholesale.

use tokio::sync::RwLock;
use validator::Validate;

use crate::{
    api::ApiClient,
    config::SearchMode,
    error::{AppError, AppResult},
    models::{Book, BorrowRequest, EntityId, Listing, NewBook, UserBooks},
    session::SessionView,
};

#[derive(Debug, Clone, Default)]
struct BookView {
    books: Vec<Book>,
    /// Active title filter; `None` shows the full collection
    filter: Option<String>,
}

pub struct CatalogController {
    api: ApiClient,
    session: SessionView,
    search_mode: SearchMode,
    view: RwLock<BookView>,
}

impl CatalogController {
    pub fn new(api: ApiClient, session: SessionView, search_mode: SearchMode) -> Self {
        Self {
            api,
            session,
            search_mode,
            view: RwLock::new(BookView::default()),
        }
    }

    /// Books currently on display
    pub async fn books(&self) -> Vec<Book> {
        self.view.read().await.books.clone()
    }

    /// Title filter currently applied, if any
    pub async fn active_search(&self) -> Option<String> {
        self.view.read().await.filter.clone()
    }

    /// Fetch the full collection and clear any filter
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        let books = self.fetch_all().await?;
        self.replace_view(books.clone(), None).await;
        Ok(books)
    }

    /// Filter by title. A blank term is the same as [`list_books`](Self::list_books).
    pub async fn search_books(&self, term: &str) -> AppResult<Vec<Book>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list_books().await;
        }

        let books = match self.search_mode {
            SearchMode::Server => self
                .api
                .get("/books")
                .query("title", term)
                .fallback("Failed to search books")
                .send::<Listing<Book>>()
                .await?
                .into_items(),
            SearchMode::Local => self
                .fetch_all()
                .await?
                .into_iter()
                .filter(|book| book.title_matches(term))
                .collect(),
        };

        self.replace_view(books.clone(), Some(term.to_string())).await;
        Ok(books)
    }

    pub async fn get_book(&self, id: &EntityId) -> AppResult<Book> {
        self.api
            .get(format!("/books/{}", id.path_segment()))
            .fallback("Failed to load book")
            .send()
            .await
    }

    pub async fn add_book(&self, book: NewBook) -> AppResult<Book> {
        let book = book.normalized();
        book.validate()?;

        let created: Book = self
            .api
            .post("/books")
            .json(&book)
            .fallback("Failed to add book")
            .send()
            .await?;

        tracing::info!(book_id = %created.id, title = %created.title, "Added book");
        self.resync().await;
        Ok(created)
    }

    /// Borrow on behalf of the session user
    pub async fn borrow_book(&self, id: &EntityId) -> AppResult<Book> {
        let user_id = self
            .session
            .user_id()
            .await
            .ok_or_else(|| AppError::Authentication("You must be logged in to borrow books".to_string()))?;

        let book: Book = self
            .api
            .post(format!("/books/{}/borrow", id.path_segment()))
            .json(&BorrowRequest { user_id: user_id.clone() })
            .fallback("Failed to borrow book")
            .send()
            .await?;

        tracing::info!(book_id = %id, %user_id, "Borrowed book");
        self.resync().await;
        Ok(book)
    }

    pub async fn return_book(&self, id: &EntityId) -> AppResult<Book> {
        let book: Book = self
            .api
            .post(format!("/books/{}/return", id.path_segment()))
            .fallback("Failed to return book")
            .send()
            .await?;

        tracing::info!(book_id = %id, "Returned book");
        self.resync().await;
        Ok(book)
    }

    pub async fn delete_book(&self, id: &EntityId) -> AppResult<()> {
        self.api
            .delete(format!("/books/{}", id.path_segment()))
            .fallback("Failed to delete book")
            .send_empty()
            .await?;

        tracing::info!(book_id = %id, "Deleted book");
        self.resync().await;
        Ok(())
    }

    /// Ids of the books the session user has borrowed
    pub async fn my_books(&self) -> AppResult<UserBooks> {
        let user_id = self
            .session
            .user_id()
            .await
            .ok_or_else(|| AppError::Authentication("You must be logged in".to_string()))?;

        self.api
            .get(format!("/users/{}/books", user_id.path_segment()))
            .fallback("Failed to load borrowed books")
            .send()
            .await
    }

    async fn fetch_all(&self) -> AppResult<Vec<Book>> {
        Ok(self
            .api
            .get("/books")
            .fallback("Failed to fetch books")
            .send::<Listing<Book>>()
            .await?
            .into_items())
    }

    async fn replace_view(&self, books: Vec<Book>, filter: Option<String>) {
        *self.view.write().await = BookView { books, filter };
    }

    /// Re-run the active query after a mutation. A failed refresh keeps the
    /// previous view; the mutation itself already succeeded.
    async fn resync(&self) {
        let filter = self.active_search().await;
        let refreshed = match filter {
            Some(term) => self.search_books(&term).await,
            None => self.list_books().await,
        };
        if let Err(e) = refreshed {
            tracing::warn!(error = %e, "Failed to refresh books after update");
        }
    }
}

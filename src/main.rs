//! library-client - command line front end for the library catalog
//!
//! Every subcommand restores the persisted session, forwards to a
//! controller and prints the result.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use library_client::{
    config::{AppConfig, LoggingConfig},
    models::{Book, EntityId, NewBook, NewUser, User, UserUpdate},
    services::{AuthState, Services},
};

/// Library catalog client.
#[derive(Parser)]
#[command(name = "library-client", version, about = "Library catalog client")]
struct Cli {
    /// Backend base URL (overrides configuration).
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LIBRARY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session.
    Logout,

    /// Create an account (does not log in).
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "LIBRARY_PASSWORD", hide_env_values = true)]
        password: String,
        /// Request administrator privileges.
        #[arg(long)]
        admin: bool,
    },

    /// Show the logged-in user.
    Whoami {
        /// Re-fetch the user from the backend.
        #[arg(long)]
        refresh: bool,
    },

    /// Catalog operations.
    #[command(subcommand)]
    Books(BookCommands),

    /// User administration (admin only).
    #[command(subcommand)]
    Users(UserCommands),
}

#[derive(Subcommand)]
enum BookCommands {
    /// List every book.
    List,
    /// Search books by title.
    Search { term: String },
    /// Show one book.
    Show { id: String },
    /// Add a book (admin only).
    ///
    /// Author and category may be left out when an explicit id is given.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Explicit id, for backends that do not assign one.
        #[arg(long)]
        id: Option<String>,
    },
    /// Borrow a book as the logged-in user.
    Borrow { id: String },
    /// Return a borrowed book.
    Return { id: String },
    /// Delete a book (admin only).
    Delete { id: String },
    /// Books you have borrowed.
    Mine,
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users.
    List,
    /// Add a user.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "LIBRARY_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        admin: bool,
    },
    /// Change a user's name and privileges.
    Edit {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
        admin: bool,
    },
    /// Delete a user (not yourself).
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(url) = cli.api_url.clone() {
        config.api.base_url = url;
    }

    let _guard = init_tracing(&config.logging);

    tracing::debug!(endpoint = %config.api.endpoint(), "Starting library-client v{}", env!("CARGO_PKG_VERSION"));

    let services = Services::new(&config).await?;
    services.auth.restore().await;

    match cli.command {
        Commands::Login { email, password } => {
            let user = services.auth.login(&email, &password).await?;
            println!("Logged in as {} <{}>{}", user.name, user.email, admin_suffix(&user));
        }

        Commands::Logout => {
            services.auth.logout().await?;
            println!("Logged out.");
        }

        Commands::Register { name, email, password, admin } => {
            let user = services
                .auth
                .register(NewUser::new(name, email, password, admin))
                .await?;
            println!("Registered {} (id {}). Log in to continue.", user.name, user.id);
        }

        Commands::Whoami { refresh } => {
            if services.auth.state().await != AuthState::Authenticated {
                println!("Not logged in.");
                return Ok(());
            }
            let user = if refresh {
                services.auth.refresh_user().await?
            } else {
                services.auth.require_user().await?
            };
            println!("{} <{}> id={}{}", user.name, user.email, user.id, admin_suffix(&user));
        }

        Commands::Books(command) => run_books(&services, command).await?,

        Commands::Users(command) => {
            services.auth.require_admin().await?;
            run_users(&services, command).await?;
        }
    }

    Ok(())
}

async fn run_books(services: &Services, command: BookCommands) -> Result<()> {
    let catalog = &services.catalog;

    match command {
        BookCommands::List => print_books(&catalog.list_books().await?),

        BookCommands::Search { term } => print_books(&catalog.search_books(&term).await?),

        BookCommands::Show { id } => {
            let book = catalog.get_book(&EntityId::from(id)).await?;
            println!("ID:          {}", book.id);
            println!("Title:       {}", book.title);
            println!("Author:      {}", book.author.as_deref().unwrap_or("-"));
            println!("Category:    {}", book.category.join(", "));
            println!("Description: {}", book.description.as_deref().unwrap_or("-"));
            println!("Status:      {}", availability(&book));
        }

        BookCommands::Add { title, author, category, description, id } => {
            services.auth.require_admin().await?;
            let book = NewBook { id, title, author, description, category };
            let created = services.admin.catalog().add_book(book).await?;
            println!("Book added: {} (id {})", created.title, created.id);
        }

        BookCommands::Borrow { id } => {
            let book = catalog.borrow_book(&EntityId::from(id)).await?;
            println!("Borrowed: {}", book.title);
        }

        BookCommands::Return { id } => {
            let book = catalog.return_book(&EntityId::from(id)).await?;
            println!("Returned: {}", book.title);
        }

        BookCommands::Delete { id } => {
            services.auth.require_admin().await?;
            services.admin.catalog().delete_book(&EntityId::from(id.clone())).await?;
            println!("Book {} deleted.", id);
        }

        BookCommands::Mine => {
            let mine = catalog.my_books().await?;
            if mine.books.is_empty() {
                println!("You have no borrowed books.");
            } else {
                for id in mine.books {
                    println!("{}", id);
                }
            }
        }
    }

    Ok(())
}

async fn run_users(services: &Services, command: UserCommands) -> Result<()> {
    let admin = &services.admin;

    match command {
        UserCommands::List => print_users(&admin.list_users().await?),

        UserCommands::Add { name, email, password, admin: is_admin } => {
            let user = admin.add_user(NewUser::new(name, email, password, is_admin)).await?;
            println!("User added: {} (id {})", user.name, user.id);
        }

        UserCommands::Edit { id, name, admin: is_admin } => {
            let user = admin
                .edit_user(&EntityId::from(id), UserUpdate::new(name, is_admin))
                .await?;
            println!("User updated: {}{}", user.name, admin_suffix(&user));
        }

        UserCommands::Delete { id } => {
            admin.delete_user(&EntityId::from(id.clone())).await?;
            println!("User {} deleted.", id);
        }
    }

    Ok(())
}

fn print_books(books: &[Book]) {
    if books.is_empty() {
        println!("No books found.");
        return;
    }

    println!("{:<12} {:<40} {:<24} {:<10}", "ID", "TITLE", "AUTHOR", "STATUS");
    println!("{}", "-".repeat(88));
    for book in books {
        println!(
            "{:<12} {:<40} {:<24} {:<10}",
            truncate(book.id.as_str(), 12),
            truncate(&book.title, 40),
            truncate(book.author.as_deref().unwrap_or("-"), 24),
            availability(book)
        );
    }
}

fn print_users(users: &[User]) {
    if users.is_empty() {
        println!("No users found.");
        return;
    }

    println!("{:<12} {:<24} {:<32} {:<6}", "ID", "NAME", "EMAIL", "ADMIN");
    println!("{}", "-".repeat(76));
    for user in users {
        println!(
            "{:<12} {:<24} {:<32} {:<6}",
            truncate(user.id.as_str(), 12),
            truncate(&user.name, 24),
            truncate(&user.email, 32),
            if user.is_admin { "yes" } else { "no" }
        );
    }
}

fn availability(book: &Book) -> &'static str {
    if book.is_borrowed() {
        "Borrowed"
    } else {
        "Available"
    }
}

fn admin_suffix(user: &User) -> &'static str {
    if user.is_admin {
        " [admin]"
    } else {
        ""
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Logs go to stderr (or a daily file) so stdout stays clean for output
fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("library_client={}", config.level).into());

    let (writer, guard) = match &config.file {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "library-client.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let fmt_layer = match config.format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_writer(writer).boxed(),
        _ => tracing_subscriber::fmt::layer().with_writer(writer).boxed(),
    };

    tracing_subscriber::registry().with(fmt_layer).with(filter).init();

    guard
}

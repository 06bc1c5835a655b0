//! Read-only book catalog.
//!
//! Handlers only see the [`BookRepository`] trait, so the dataset can be
//! swapped for another source (or a test double) without touching any call
//! pattern logic. Implementors provide the records; the lookups are provided
//! methods that scan them in collection order.

use folio_tonic_core::proto::book::Book;

/// An immutable, shareable collection of books.
pub trait BookRepository: Send + Sync + 'static {
    /// All records, in collection order.
    fn books(&self) -> &[Book];

    /// First record whose title matches exactly.
    fn find_by_title(&self, title: &str) -> Option<Book> {
        self.books().iter().find(|b| b.title == title).cloned()
    }

    /// First record whose author matches exactly.
    fn find_by_author(&self, author: &str) -> Option<Book> {
        self.books().iter().find(|b| b.author == author).cloned()
    }

    /// Every record with this title, lazily and in collection order.
    fn find_all_by_title<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a Book> + Send + 'a {
        self.books().iter().filter(move |b| b.title == title)
    }
}

/// The built-in four-record catalog.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    books: Vec<Book>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        let book = |title: &str, subject: &str, author: &str| Book {
            title: title.to_string(),
            subject: subject.to_string(),
            audience: "Software Engineers".to_string(),
            author: author.to_string(),
            price: 999.0,
        };

        Self {
            books: vec![
                book(
                    "Domain Driven Design",
                    "Tackling complexity in the heart of Software",
                    "Eric Evans",
                ),
                book(
                    "Java",
                    "Comprehensive guide to the entire Java laguage",
                    "Herbert Schildt",
                ),
                book("Java", "Head First Java", "Kathy Sierra"),
                book("Java", "Effective Java", "Joshua Bloch"),
            ],
        }
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl BookRepository for StaticCatalog {
    fn books(&self) -> &[Book] {
        &self.books
    }
}

impl From<Vec<Book>> for StaticCatalog {
    fn from(books: Vec<Book>) -> Self {
        Self { books }
    }
}

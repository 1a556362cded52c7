use std::{fmt::Display, sync::Arc};

use http_client::{HttpClient, Request};
use log::{debug, warn};
use serde::Deserialize;
use serde_with::{DefaultOnNull, serde_as};

use crate::{
    BookId,
    api::{auth::ApiCredentials, authenticated, check_ok},
    error::{ProgressError, RawProgressError},
};

/// The `shelf_type` of the shelf holding books a user is currently reading.
pub const READING_SHELF_TYPE: &str = "Reading";

/// An identifier assigned by the reading service, which may be encoded as a number or a string.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RemoteId {
    Number(i64),
    Text(String),
}

impl RemoteId {
    pub fn matches(&self, book: &BookId) -> bool {
        match self {
            RemoteId::Number(id) => book.as_str().parse::<i64>() == Ok(*id),
            RemoteId::Text(id) => id == book.as_str(),
        }
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteId::Number(id) => write!(f, "{id}"),
            RemoteId::Text(id) => f.write_str(id),
        }
    }
}

/// A shelf as returned by `GET /shelves`. Fields other than the ones needed to find the reading
/// shelf are ignored.
#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Shelf {
    pub id: RemoteId,
    pub shelf_type: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub editions: Vec<ShelfEdition>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ShelfEdition {
    #[serde(alias = "bookId")]
    pub book_id: RemoteId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadingShelfMembership {
    /// The book is an edition on the reading shelf.
    Present { shelf: RemoteId },
    /// The user has a reading shelf, but the book isn't on it.
    Absent { shelf: RemoteId },
    /// The user doesn't have a shelf of type [READING_SHELF_TYPE].
    NoReadingShelf,
}

impl ReadingShelfMembership {
    pub fn find(shelves: &[Shelf], book: &BookId) -> Self {
        let Some(shelf) = shelves
            .iter()
            .find(|shelf| shelf.shelf_type == READING_SHELF_TYPE)
        else {
            return Self::NoReadingShelf;
        };

        let shelf_id = shelf.id.clone();
        if shelf.editions.iter().any(|e| e.book_id.matches(book)) {
            Self::Present { shelf: shelf_id }
        } else {
            Self::Absent { shelf: shelf_id }
        }
    }
}

/// Inspects whether a book is on the user's reading shelf before progress is written.
///
/// This is a soft dependency: the check never enrolls the book and never fails the write. Its
/// outcome is only logged.
pub struct ShelfPrecondition {
    client: Arc<dyn HttpClient>,
}

impl ShelfPrecondition {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Returns whether `book` could be confirmed to be on the reading shelf.
    pub async fn ensure_on_reading_shelf(&self, book: &BookId, auth: &ApiCredentials) -> bool {
        match self.reading_shelf_membership(book, auth).await {
            Ok(ReadingShelfMembership::Present { shelf }) => {
                debug!("Book {book} is on reading shelf {shelf}");
                true
            }
            Ok(ReadingShelfMembership::Absent { shelf }) => {
                warn!("Book {book} is not on reading shelf {shelf}");
                false
            }
            Ok(ReadingShelfMembership::NoReadingShelf) => {
                warn!("User has no reading shelf, can't place book {book}");
                false
            }
            Err(e) => {
                warn!("{e}, writing progress for {book} regardless");
                false
            }
        }
    }

    pub async fn reading_shelf_membership(
        &self,
        book: &BookId,
        auth: &ApiCredentials,
    ) -> Result<ReadingShelfMembership, ProgressError> {
        let shelves = self
            .fetch_shelves(auth)
            .await
            .map_err(|e| RawProgressError::ShelfCheckFailed { inner: e })?;

        Ok(ReadingShelfMembership::find(&shelves, book))
    }

    async fn fetch_shelves(&self, auth: &ApiCredentials) -> Result<Vec<Shelf>, ProgressError> {
        let request = authenticated(Request::get(auth.resolve("shelves")?), auth);

        let mut response = self.client.send(request).await?;
        check_ok(&mut response).await?;

        let body = response.body_string().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{ReadingShelfMembership, RemoteId, Shelf};
    use crate::BookId;

    fn shelves(value: serde_json::Value) -> Vec<Shelf> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn finds_book_on_reading_shelf() {
        let shelves = shelves(json!([
            {"id": 1, "shelf_type": "Favorites", "editions": [{"book_id": 7}]},
            {"id": 2, "shelf_type": "Reading", "editions": [{"book_id": 3}, {"book_id": 7}]},
        ]));

        assert_eq!(
            ReadingShelfMembership::find(&shelves, &BookId::from("7")),
            ReadingShelfMembership::Present {
                shelf: RemoteId::Number(2)
            }
        );
    }

    #[test]
    fn book_missing_from_reading_shelf() {
        let shelves = shelves(json!([
            {"id": "reading", "shelf_type": "Reading", "editions": null, "name": "Now reading"},
            {"id": "favs", "shelf_type": "Favorites", "editions": [{"bookId": "b-1"}]},
        ]));

        assert_eq!(
            ReadingShelfMembership::find(&shelves, &BookId::from("b-1")),
            ReadingShelfMembership::Absent {
                shelf: RemoteId::Text("reading".to_string())
            }
        );
    }

    #[test]
    fn no_reading_shelf() {
        let shelves = shelves(json!([{"id": 1, "shelf_type": "Read"}]));

        assert_eq!(
            ReadingShelfMembership::find(&shelves, &BookId::from("1")),
            ReadingShelfMembership::NoReadingShelf
        );
        assert_eq!(
            ReadingShelfMembership::find(&[], &BookId::from("1")),
            ReadingShelfMembership::NoReadingShelf
        );
    }

    #[test]
    fn text_ids_match_numeric_books() {
        assert!(RemoteId::Text("12".to_string()).matches(&BookId::from("12")));
        assert!(RemoteId::Number(12).matches(&BookId::from("12")));
        assert!(!RemoteId::Number(12).matches(&BookId::from("twelve")));
    }
}

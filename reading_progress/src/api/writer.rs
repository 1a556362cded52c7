use std::sync::Arc;

use http_client::{HttpClient, Request};
use log::debug;
use serde::Serialize;

use crate::{
    BookId,
    api::{auth::ApiCredentials, authenticated, check_ok},
    error::ProgressError,
};

/// Confirmation that the reading service stored a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressAck {
    pub page: u32,
}

#[derive(Serialize)]
struct UpdateProgressRequest<'a> {
    book_id: &'a BookId,
    page_num: u32,
}

/// Issues the authoritative `POST /progress/update-progress` write.
///
/// Any 2xx response acknowledges the page. `401` maps to
/// [crate::error::ProgressErrorKind::Unauthenticated], other statuses to
/// [crate::error::ProgressErrorKind::Rejected]. Nothing is retried here.
pub struct ProgressWriter {
    client: Arc<dyn HttpClient>,
}

impl ProgressWriter {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    pub async fn write_progress(
        &self,
        book: &BookId,
        page: u32,
        auth: &ApiCredentials,
    ) -> Result<ProgressAck, ProgressError> {
        let mut request = authenticated(
            Request::post(auth.resolve("progress/update-progress")?),
            auth,
        );
        request.set_body(serde_json::to_string(&UpdateProgressRequest {
            book_id: book,
            page_num: page,
        })?);

        debug!("Writing page {page} for book {book}");
        let mut response = self.client.send(request).await?;
        check_ok(&mut response).await?;

        Ok(ProgressAck { page })
    }
}

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use http_client::{
    Error, HttpClient, Request, Response,
    http_types::{StatusCode, mime},
};
use serde::Deserialize;
use serde_json::{Value, json};

/// An in-memory reading service answering `GET /shelves` and `POST /progress/update-progress`.
pub struct MockReadingService {
    /// Receives every progress write, in the order the requests arrived.
    pub progress_writes: async_channel::Receiver<RecordedWrite>,
    record_write: async_channel::Sender<RecordedWrite>,
    write_count: AtomicUsize,
    shelf_requests: AtomicUsize,
    /// The body returned for `GET /shelves`.
    pub shelves: Mutex<MockResponse>,
    /// Computes the response for a progress write.
    pub progress_response: Mutex<Box<dyn Fn(&RecordedWrite) -> MockResponse + Send>>,
    write_gate: Mutex<Option<async_channel::Receiver<()>>>,
    unreachable: AtomicBool,
}

impl Default for MockReadingService {
    fn default() -> Self {
        let (record_write, progress_writes) = async_channel::unbounded();

        Self {
            progress_writes,
            record_write,
            write_count: AtomicUsize::new(0),
            shelf_requests: AtomicUsize::new(0),
            shelves: Mutex::new(MockResponse::ok(json!([
                {"id": 1, "shelf_type": "Reading", "editions": []},
                {"id": 2, "shelf_type": "Favorites", "editions": []},
            ]))),
            progress_response: Mutex::new(Box::new(|write: &RecordedWrite| {
                MockResponse::ok(json!({"book_id": write.book_id, "page_num": write.page_num}))
            })),
            write_gate: Mutex::new(None),
            unreachable: AtomicBool::new(false),
        }
    }
}

impl MockReadingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(self: Arc<Self>) -> impl HttpClient {
        struct MockClient {
            service: Arc<MockReadingService>,
        }

        impl std::fmt::Debug for MockClient {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct("MockClient").finish()
            }
        }

        #[async_trait]
        impl HttpClient for MockClient {
            async fn send(&self, req: Request) -> Result<Response, Error> {
                if self.service.unreachable.load(Ordering::SeqCst) {
                    return Err(Error::from_str(
                        StatusCode::ServiceUnavailable,
                        "connection refused",
                    ));
                }

                match req.url().path() {
                    "/shelves" => Ok(self.service.shelves_response()),
                    "/progress/update-progress" => Ok(self.service.update_progress(req).await),
                    _ => Ok(Response::new(StatusCode::NotFound)),
                }
            }
        }

        MockClient { service: self }
    }

    /// How many progress writes have been received so far.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn shelf_requests(&self) -> usize {
        self.shelf_requests.load(Ordering::SeqCst)
    }

    /// Answers every progress write with `code` and `body`.
    pub fn respond_to_writes(&self, code: StatusCode, body: &'static str) {
        *self.progress_response.lock().unwrap() =
            Box::new(move |_: &RecordedWrite| MockResponse::text(code, body));
    }

    /// While set, every request fails before reaching the service, like a dropped connection.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Holds progress write responses until a message is sent through the returned channel, one
    /// message per write.
    ///
    /// Writes are still recorded in [Self::progress_writes] as soon as they arrive.
    pub fn hold_writes(&self) -> async_channel::Sender<()> {
        let (release, gate) = async_channel::unbounded();
        *self.write_gate.lock().unwrap() = Some(gate);
        release
    }

    fn shelves_response(&self) -> Response {
        self.shelf_requests.fetch_add(1, Ordering::SeqCst);
        self.shelves.lock().unwrap().to_response()
    }

    async fn update_progress(&self, mut req: Request) -> Response {
        #[derive(Deserialize)]
        struct UpdateProgress {
            book_id: String,
            page_num: u32,
        }

        let authorization = req
            .header("Authorization")
            .map(|values| values.last().as_str().to_string());
        let Ok(body) = req.body_json::<UpdateProgress>().await else {
            return MockResponse::text(StatusCode::BadRequest, "malformed body").to_response();
        };

        let write = RecordedWrite {
            book_id: body.book_id,
            page_num: body.page_num,
            authorization,
        };
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.record_write.send(write.clone()).await.unwrap();

        let gate = self.write_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.recv().await;
        }

        let response = { self.progress_response.lock().unwrap()(&write) };
        response.to_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub book_id: String,
    pub page_num: u32,
    /// The `Authorization` header sent with the write.
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub code: StatusCode,
    pub body: String,
    pub json: bool,
}

impl MockResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            code: StatusCode::Ok,
            body: body.to_string(),
            json: true,
        }
    }

    pub fn text(code: StatusCode, body: &str) -> Self {
        Self {
            code,
            body: body.to_string(),
            json: false,
        }
    }

    fn to_response(&self) -> Response {
        let mut response = Response::new(self.code);
        if self.json {
            response.set_content_type(mime::JSON);
        }
        response.set_body(self.body.clone());
        response
    }
}

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hand_analyzer::{AnalysisClient, AnalysisError, AnalysisRequest};
use image::{ImageBuffer, ImageOutputFormat, Rgb};
use tokio::sync::Semaphore;

type Responder =
    Box<dyn Fn(&AnalysisRequest) -> Result<Option<String>, AnalysisError> + Send + Sync>;

/// Stand-in for the model service.
pub struct MockClient {
    respond: Responder,
    gate: Option<Arc<Semaphore>>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl MockClient {
    /// Answer calls in order from a fixed script. `Err` entries become
    /// service failures with that message.
    pub fn scripted(script: Vec<Result<Option<&str>, &str>>) -> Self {
        let script: VecDeque<_> = script
            .into_iter()
            .map(|r| r.map(|t| t.map(str::to_string)).map_err(str::to_string))
            .collect();
        let script = Mutex::new(script);

        Self::with_fn(move |_| {
            script
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted")
                .map_err(AnalysisError::Service)
        })
    }

    pub fn with_fn(
        f: impl Fn(&AnalysisRequest) -> Result<Option<String>, AnalysisError> + Send + Sync + 'static,
    ) -> Self {
        Self { respond: Box::new(f), gate: None, requests: Mutex::new(Vec::new()) }
    }

    /// Hold every call until a permit is added to `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisClient for MockClient {
    async fn generate(&self, request: &AnalysisRequest) -> Result<Option<String>, AnalysisError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        (self.respond)(request)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn red_png() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(10, 10, Rgb([255u8, 0, 0]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png).unwrap();
    bytes
}

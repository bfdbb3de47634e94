//! In-memory transport for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::transport::{ApplicationService, TransportProvider};
use crate::wire::SendMessageRequest;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<SendMessageRequest>>,
    closes: AtomicUsize,
}

/// Records every call; can be told to fail or panic in the call, or fail the connection
#[derive(Clone, Default)]
pub(crate) struct RecordingProvider {
    recorder: Arc<Recorder>,
    fail_send: bool,
    panic_send: bool,
    fail_connect: bool,
}

impl RecordingProvider {
    pub(crate) fn failing() -> Self {
        Self {
            fail_send: true,
            ..Self::default()
        }
    }

    pub(crate) fn panicking() -> Self {
        Self {
            panic_send: true,
            ..Self::default()
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<SendMessageRequest> {
        self.recorder.calls.lock().clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.recorder.closes.load(Ordering::SeqCst)
    }
}

struct RecordingService {
    recorder: Arc<Recorder>,
    fail: bool,
    panic: bool,
}

#[async_trait]
impl ApplicationService for RecordingService {
    async fn send_message(&mut self, request: &SendMessageRequest) -> Result<()> {
        self.recorder.calls.lock().push(request.clone());
        if self.panic {
            panic!("transport blew up");
        }
        if self.fail {
            return Err(Error::Delivery("service unavailable".to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportProvider for RecordingProvider {
    async fn get(&self) -> Result<Box<dyn ApplicationService>> {
        if self.fail_connect {
            return Err(Error::Transport("no route to service".to_string()));
        }
        Ok(Box::new(RecordingService {
            recorder: Arc::clone(&self.recorder),
            fail: self.fail_send,
            panic: self.panic_send,
        }))
    }
}

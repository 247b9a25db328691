//! Render sinks the event loop mounts frames into

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use tokio::sync::{Mutex, RwLock};

use super::{render_text, RenderFrame};

/// Anything that can display a dashboard frame
#[async_trait]
pub trait RenderSink: Send {
    async fn mount(&mut self, frame: &RenderFrame);
}

/// Prints each frame as text
pub struct TerminalSink<W: Write + Send> {
    out: W,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> RenderSink for TerminalSink<W> {
    async fn mount(&mut self, frame: &RenderFrame) {
        let text = render_text(frame);
        if let Err(e) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush())
        {
            warn!("Failed to write frame: {}", e);
        }
    }
}

/// Keeps the latest frame for readers such as the HTTP server
#[derive(Clone, Default)]
pub struct SharedFrame {
    inner: Arc<RwLock<Option<RenderFrame>>>,
}

impl SharedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self) -> Option<RenderFrame> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl RenderSink for SharedFrame {
    async fn mount(&mut self, frame: &RenderFrame) {
        *self.inner.write().await = Some(frame.clone());
    }
}

/// Records every mounted frame
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub frames: Arc<Mutex<Vec<RenderFrame>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last(&self) -> Option<RenderFrame> {
        self.frames.lock().await.last().cloned()
    }

    pub async fn len(&self) -> usize {
        self.frames.lock().await.len()
    }
}

#[async_trait]
impl RenderSink for RecordingSink {
    async fn mount(&mut self, frame: &RenderFrame) {
        self.frames.lock().await.push(frame.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardState;
    use crate::polling::PollingScheduler;
    use crate::pyramid::{PyramidStyle, Timeframe};

    fn frame() -> RenderFrame {
        DashboardState::new("GBP/USD", PyramidStyle::Swing, Timeframe::M15)
            .frame(PollingScheduler::default().status())
    }

    #[tokio::test]
    async fn test_terminal_sink_writes_text() {
        let mut sink = TerminalSink::new(Vec::new());
        sink.mount(&frame()).await;
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert!(written.starts_with("Loading market data..."));
    }

    #[tokio::test]
    async fn test_shared_frame_keeps_latest() {
        let shared = SharedFrame::new();
        assert!(shared.latest().await.is_none());

        let mut writer = shared.clone();
        writer.mount(&frame()).await;
        assert_eq!(shared.latest().await.unwrap().pair, "GBP/USD");
    }
}

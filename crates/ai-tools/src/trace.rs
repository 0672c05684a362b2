#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;

/// A small, allocation-friendly trace event.
///
/// This is intentionally "dumb data" so it can be recorded while a tree runs and later rendered
/// by tooling. `a` and `b` are tag-specific payloads (typically a node index and a counter).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub tick: u64,
    pub tag: Cow<'static, str>,
    pub a: u64,
    pub b: u64,
}

impl TraceEvent {
    pub fn new(tick: u64, tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tick,
            tag: tag.into(),
            a: 0,
            b: 0,
        }
    }

    pub fn with_a(mut self, a: u64) -> Self {
        self.a = a;
        self
    }

    pub fn with_b(mut self, b: u64) -> Self {
        self.b = b;
        self
    }
}

pub trait TraceSink: Send {
    fn emit(&mut self, event: TraceEvent);
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

#[derive(Debug, Default)]
pub struct VecTraceSink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for VecTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn count(&self, tag: &str) -> usize {
        self.events.iter().filter(|e| e.tag == tag).count()
    }

    pub fn ticks_of(&self, tag: &str) -> Vec<u64> {
        self.events
            .iter()
            .filter(|e| e.tag == tag)
            .map(|e| e.tick)
            .collect()
    }
}

/// A trace log that can be handed to a tree as a sink while the caller keeps a handle to read it.
#[derive(Debug, Clone, Default)]
pub struct SharedTraceLog(Arc<Mutex<TraceLog>>);

impl SharedTraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> Box<dyn TraceSink> {
        Box::new(self.clone())
    }

    pub fn count(&self, tag: &str) -> usize {
        self.0.lock().count(tag)
    }

    pub fn ticks_of(&self, tag: &str) -> Vec<u64> {
        self.0.lock().ticks_of(tag)
    }

    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.0.lock().events.clone()
    }

    pub fn clear(&self) {
        self.0.lock().events.clear();
    }
}

impl TraceSink for SharedTraceLog {
    fn emit(&mut self, event: TraceEvent) {
        self.0.lock().push(event);
    }
}

/// Emit into an optional sink; trees without tracing pay only the branch.
pub fn emit(sink: &mut Option<Box<dyn TraceSink>>, event: TraceEvent) {
    if let Some(sink) = sink.as_mut() {
        sink.emit(event);
    }
}

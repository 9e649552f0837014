//! Execution tracing hook (`SPEC_FULL.md` §4.7 expansion).
//!
//! The engine performs no ambient I/O (`spec.md` §6 "Observable side
//! effects: None") so diagnostics cannot be a `log`/`tracing` call baked
//! into the interpreter — instead, as with the teacher's `tracer::VmTracer`,
//! tracing is a trait the embedder opts into. [`NoopTracer`] is the
//! zero-cost default; [`RecordingTracer`] collects a bounded trace of
//! evaluated node positions, handy when debugging a host integration.

use crate::source::CodeLoc;

/// A single traced evaluation step.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub loc: CodeLoc,
    pub label: &'static str,
}

/// Hook invoked by the interpreter at each statement/call step.
///
/// Never on the hot path of [`crate::resource::ResourceTracker`] — tracing is
/// purely observational and never influences limits.
pub trait VmTracer {
    fn on_step(&mut self, _loc: &CodeLoc, _label: &'static str) {}
    fn on_call(&mut self, _name: &str, _loc: &CodeLoc) {}
}

/// The default: does nothing, costs nothing.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Collects up to `capacity` trace events, then silently drops the rest.
///
/// Bounded so a pathological script cannot turn tracing itself into a
/// memory-exhaustion vector independent of the engine's own metering.
#[derive(Debug)]
pub struct RecordingTracer {
    capacity: usize,
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, events: Vec::new() }
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }
}

impl VmTracer for RecordingTracer {
    fn on_step(&mut self, loc: &CodeLoc, label: &'static str) {
        if self.events.len() < self.capacity {
            self.events.push(TraceEvent { loc: loc.clone(), label });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_tracer_respects_capacity() {
        let mut tracer = RecordingTracer::new(2);
        let loc = CodeLoc::new(std::rc::Rc::from("t.js"), 1, 1);
        tracer.on_step(&loc, "stmt");
        tracer.on_step(&loc, "stmt");
        tracer.on_step(&loc, "stmt");
        assert_eq!(tracer.events().len(), 2);
    }
}

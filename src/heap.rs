//! Per-execution object arena (`spec.md` §3 "Object", §9 "Design notes").
//!
//! Every object, array, boxed primitive, function and host object allocated
//! during one execution lives in this arena, addressed by the small `Copy`
//! handle [`HeapId`]. Unlike the teacher's reference-counted heap (built for
//! long-lived, incrementally-freed REPL sessions), this arena is a plain
//! bump allocator: nothing is ever freed mid-execution, and the whole arena
//! is dropped in one shot when the owning `EvalCtx` ends (`spec.md` §4.6,
//! §9) — there are no cycles to collect because nothing is ever collected.

use crate::object::Object;

/// Handle to an object living in a single execution's [`Heap`].
///
/// Never meaningful across two different `Heap`s; in particular, never
/// meaningful across two different executions of the same `ParsedScript`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    fn new(index: usize) -> Self {
        Self(index.try_into().expect("heap overflow"))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Snapshot of heap growth, returned as part of [`crate::run::ExecutionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub live_objects: usize,
    pub ops: u64,
    pub allocated_bytes: usize,
}

/// The object arena for a single execution.
///
/// Parameterized over nothing but the object storage itself; resource
/// accounting is a separate concern owned by
/// [`crate::resource::ResourceTracker`] and invoked by the interpreter at
/// allocation sites, not by the arena (the arena has no opinion on limits).
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, object: Object) -> HeapId {
        let id = HeapId::new(self.objects.len());
        self.objects.push(object);
        id
    }

    pub fn get(&self, id: HeapId) -> &Object {
        &self.objects[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut Object {
        &mut self.objects[id.index()]
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats { live_objects: self.objects.len(), ops: 0, allocated_bytes: 0 }
    }
}

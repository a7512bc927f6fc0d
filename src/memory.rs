use std::cell::Cell;

//===----------------------------------------------------------------------===//
// Allocation bookkeeping
//
// The interpreter is single-threaded, so plain thread-local cells are
// enough. Object constructors report their footprint and Drop impls give it
// back; the REPL surfaces the totals through the :mem command.
//===----------------------------------------------------------------------===//

thread_local! {
    static LIVE_OBJECTS: Cell<usize> = Cell::new(0);
    static LIVE_BYTES: Cell<usize> = Cell::new(0);
    static TOTAL_ALLOCATED: Cell<usize> = Cell::new(0);
}

pub fn track(bytes: usize) {
    LIVE_OBJECTS.with(|c| c.set(c.get() + 1));
    LIVE_BYTES.with(|c| c.set(c.get() + bytes));
    TOTAL_ALLOCATED.with(|c| c.set(c.get() + bytes));
}

pub fn release(bytes: usize) {
    LIVE_OBJECTS.with(|c| c.set(c.get().saturating_sub(1)));
    LIVE_BYTES.with(|c| c.set(c.get().saturating_sub(bytes)));
}

/// (live objects, live bytes, total bytes ever allocated)
pub fn stats() -> (usize, usize, usize) {
    (
        LIVE_OBJECTS.with(|c| c.get()),
        LIVE_BYTES.with(|c| c.get()),
        TOTAL_ALLOCATED.with(|c| c.get()),
    )
}

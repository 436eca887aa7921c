//! Iteration state shared by the QR engines.
//!
//! Window bounds, split stack and step counters live in one explicit struct
//! so every orchestrator transition is visible in its signature and the state
//! machine can be exercised on its own. Split handling is an explicit LIFO
//! stack, never recursion, so worst-case depth is bounded by the matrix size.

/// Inclusive index range `[x1, x2]` of the still-unconverged submatrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub x1: usize,
    pub x2: usize,
}

impl Window {
    /// Number of rows in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.x2 - self.x1 + 1
    }
}

/// Per-decomposition iteration state.
///
/// Created fresh for every call; [`reset`](IterState::reset) restores every
/// field, so reusing an engine for a second matrix cannot leak window bounds,
/// split boundaries or counters from the first.
#[derive(Debug, Clone)]
pub(crate) struct IterState {
    /// Active window, or `None` once the current block is exhausted and a
    /// split must be popped (or the iteration is finished).
    window: Option<Window>,
    /// Deferred upper boundaries, consumed LIFO.
    splits: Vec<usize>,
    /// Steps taken on the current window; reset on every convergence/split.
    pub steps: usize,
    /// Value of `steps` when the last exceptional shift was issued.
    pub last_exceptional: usize,
    /// Exceptional shifts issued on the current window.
    pub num_exceptional: usize,
}

impl IterState {
    pub fn new(n: usize) -> Self {
        let mut state = Self {
            window: None,
            splits: Vec::with_capacity(n),
            steps: 0,
            last_exceptional: 0,
            num_exceptional: 0,
        };
        state.reset(n);
        state
    }

    /// Restore the initial state for an `n`-row problem.
    pub fn reset(&mut self, n: usize) {
        self.window = if n > 0 {
            Some(Window { x1: 0, x2: n - 1 })
        } else {
            None
        };
        self.splits.clear();
        self.steps = 0;
        self.last_exceptional = 0;
        self.num_exceptional = 0;
    }

    #[inline]
    pub fn window(&self) -> Option<Window> {
        self.window
    }

    /// Record one implicit step.
    #[inline]
    pub fn count_step(&mut self) {
        self.steps += 1;
    }

    /// Zero the per-window counters after a convergence or split.
    pub fn reset_steps(&mut self) {
        self.steps = 0;
        self.last_exceptional = 0;
        self.num_exceptional = 0;
    }

    /// Record that an exceptional shift was just issued.
    pub fn note_exceptional(&mut self) {
        self.num_exceptional += 1;
        self.last_exceptional = self.steps;
    }

    /// Shrink the window from the bottom by `k` converged rows.
    pub fn shrink(&mut self, k: usize) {
        let w = self.window.expect("shrink on an exhausted window");
        debug_assert!(k >= 1 && k <= w.len());
        self.window = if w.len() > k {
            Some(Window { x1: w.x1, x2: w.x2 - k })
        } else {
            None
        };
    }

    /// Split at internal boundary `i`: the active window narrows to
    /// `[i+1, x2]` and `i` is deferred as a future upper boundary.
    ///
    /// Everything at or above row `i` is decoupled by the band invariant, so
    /// no work is lost.
    pub fn split_at(&mut self, i: usize) {
        let w = self.window.expect("split on an exhausted window");
        debug_assert!(i >= w.x1 && i < w.x2);
        self.splits.push(i);
        self.window = Some(Window { x1: i + 1, x2: w.x2 });
    }

    /// Resume the most recently deferred block. Returns `false` when no
    /// splits remain, i.e. the whole matrix has converged.
    pub fn next_split(&mut self) -> bool {
        let Some(x2) = self.splits.pop() else {
            return false;
        };
        let x1 = self.splits.last().map_or(0, |&s| s + 1);
        self.window = Some(Window { x1, x2 });
        true
    }
}

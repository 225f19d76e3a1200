// contrato-core/src/product.rs
// ============================================================================
// Module: Prunable Cartesian Product
// Description: Lazy depth-first product over lists with a pruning reducer.
// Purpose: Enumerate selector combinations without materializing the product.
// Dependencies: none
// ============================================================================

//! ## Overview
//! [`CartesianProduct`] walks the product of several lists depth first with
//! an explicit stack. Each level folds one element into the accumulator of
//! the level above through a [`ProductReducer`]; a reducer returning `None`
//! discards the whole subtree below that element. Live state is one frame
//! per level, so memory is bounded by the number of lists.
//!
//! Empty lists are skipped. When every list is empty, or there are none, the
//! product is empty. Leaves are produced in lexicographic order of their
//! element positions.

// ============================================================================
// SECTION: Reducer
// ============================================================================

/// Folds one element into a partial accumulator.
pub trait ProductReducer<T, A> {
    /// Extends `accumulator` with `element`, or returns `None` to prune.
    fn reduce(&mut self, accumulator: &A, element: &T) -> Option<A>;
}

impl<T, A, F> ProductReducer<T, A> for F
where
    F: FnMut(&A, &T) -> Option<A>,
{
    fn reduce(&mut self, accumulator: &A, element: &T) -> Option<A> {
        self(accumulator, element)
    }
}

// ============================================================================
// SECTION: Product Iterator
// ============================================================================

/// One level of the depth-first walk.
#[derive(Debug)]
struct Frame<A> {
    /// Accumulator before folding this level.
    accumulator: A,
    /// Next element position in this level's list.
    next: usize,
}

/// Lazy, prunable cartesian product.
#[derive(Debug)]
pub struct CartesianProduct<T, A, R> {
    /// Non-empty input lists.
    lists: Vec<Vec<T>>,
    /// Pruning reducer.
    reducer: R,
    /// Active frames, one per level.
    stack: Vec<Frame<A>>,
}

impl<T, A, R> CartesianProduct<T, A, R>
where
    R: ProductReducer<T, A>,
{
    /// Creates a product over `lists` starting from `initial`.
    pub fn new(lists: Vec<Vec<T>>, initial: A, reducer: R) -> Self {
        let lists: Vec<Vec<T>> = lists.into_iter().filter(|list| !list.is_empty()).collect();
        let stack = if lists.is_empty() {
            Vec::new()
        } else {
            vec![Frame {
                accumulator: initial,
                next: 0,
            }]
        };
        Self {
            lists,
            reducer,
            stack,
        }
    }

    /// Number of non-empty lists, the depth of every leaf.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lists.len()
    }
}

impl<T, A, R> Iterator for CartesianProduct<T, A, R>
where
    R: ProductReducer<T, A>,
{
    type Item = A;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.stack.len().checked_sub(1)?;
            let list = self.lists.get(level)?;
            let frame = self.stack.last_mut()?;
            let Some(element) = list.get(frame.next) else {
                self.stack.pop();
                continue;
            };
            frame.next += 1;
            let Some(accumulator) = self.reducer.reduce(&frame.accumulator, element) else {
                continue;
            };
            if level + 1 == self.lists.len() {
                return Some(accumulator);
            }
            self.stack.push(Frame {
                accumulator,
                next: 0,
            });
        }
    }
}

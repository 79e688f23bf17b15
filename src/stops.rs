//! Pool of reusable gradient stop buffers.
//!
//! The karaoke transition band is drawn with a 4-stop gradient on every
//! frame. Renting the stop buffer from a pool avoids an allocation per frame.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

use crate::types::GradientStop;

/// Number of stops in every pooled buffer.
pub const STOP_COUNT: usize = 4;

/// Idle buffers kept around; extra returns are dropped.
const MAX_IDLE: usize = 4;

/// A pooled 4-slot gradient stop buffer.
pub type Stops = [GradientStop; STOP_COUNT];

thread_local! {
    static POOL: GradientStopPool = GradientStopPool::new();
}

/// A single-threaded pool of 4-slot gradient stop buffers.
///
/// Buffers are handed out as [`StopsRental`] guards and come back to the pool
/// when the guard is dropped, on every exit path. The pool is not `Sync`;
/// each rendering thread uses its own (see [`with_thread_pool`]).
#[derive(Debug, Default)]
pub struct GradientStopPool {
    idle: RefCell<Vec<Box<Stops>>>,
}

impl GradientStopPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rents a buffer, allocating only when no idle buffer is available.
    ///
    /// The buffer's previous contents are unspecified; callers overwrite all
    /// four slots.
    pub fn rent(&self) -> StopsRental<'_> {
        let stops = self
            .idle
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Box::new([GradientStop::default(); STOP_COUNT]));
        StopsRental {
            pool: self,
            stops: Some(stops),
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle_count(&self) -> usize {
        self.idle.borrow().len()
    }

    fn give_back(&self, stops: Box<Stops>) {
        let mut idle = self.idle.borrow_mut();
        if idle.len() < MAX_IDLE {
            idle.push(stops);
        }
    }
}

/// Runs `f` with the calling thread's stop pool.
pub fn with_thread_pool<R>(f: impl FnOnce(&GradientStopPool) -> R) -> R {
    POOL.with(f)
}

/// A rented stop buffer. Returned to its pool on drop.
#[derive(Debug)]
pub struct StopsRental<'a> {
    pool: &'a GradientStopPool,
    stops: Option<Box<Stops>>,
}

impl Deref for StopsRental<'_> {
    type Target = Stops;

    fn deref(&self) -> &Stops {
        // Only `Drop` takes the buffer out.
        match &self.stops {
            Some(stops) => stops,
            None => unreachable!("stop buffer already returned"),
        }
    }
}

impl DerefMut for StopsRental<'_> {
    fn deref_mut(&mut self) -> &mut Stops {
        match &mut self.stops {
            Some(stops) => stops,
            None => unreachable!("stop buffer already returned"),
        }
    }
}

impl Drop for StopsRental<'_> {
    fn drop(&mut self) {
        if let Some(stops) = self.stops.take() {
            self.pool.give_back(stops);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rental_returns_to_pool_on_drop() {
        let pool = GradientStopPool::new();
        assert_eq!(pool.idle_count(), 0);
        {
            let mut stops = pool.rent();
            stops[0] = GradientStop::new(0.0, [1.0, 0.0, 0.0, 1.0]);
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn buffer_is_reused() {
        let pool = GradientStopPool::new();
        let first = {
            let stops = pool.rent();
            std::ptr::from_ref::<Stops>(&stops) as usize
        };
        let second = {
            let stops = pool.rent();
            std::ptr::from_ref::<Stops>(&stops) as usize
        };
        assert_eq!(first, second);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn nested_rentals_get_distinct_buffers() {
        let pool = GradientStopPool::new();
        let mut a = pool.rent();
        let mut b = pool.rent();
        a[3].offset = 1.0;
        b[3].offset = 0.5;
        assert!((a[3].offset - 1.0).abs() < f32::EPSILON);
        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn returned_on_early_exit() {
        fn fill(pool: &GradientStopPool, fail: bool) -> Result<f32, ()> {
            let mut stops = pool.rent();
            stops[1].offset = 0.25;
            if fail {
                return Err(());
            }
            Ok(stops[1].offset)
        }

        let pool = GradientStopPool::new();
        assert!(fill(&pool, true).is_err());
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(fill(&pool, false), Ok(0.25));
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn returned_on_unwind() {
        let pool = GradientStopPool::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _stops = pool.rent();
            panic!("draw failed");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn idle_buffers_are_capped() {
        let pool = GradientStopPool::new();
        let rentals: Vec<_> = (0..MAX_IDLE + 2).map(|_| pool.rent()).collect();
        drop(rentals);
        assert_eq!(pool.idle_count(), MAX_IDLE);
    }

    #[test]
    fn thread_pool_is_shared_within_thread() {
        with_thread_pool(|pool| drop(pool.rent()));
        let idle = with_thread_pool(GradientStopPool::idle_count);
        assert!(idle >= 1);
    }
}

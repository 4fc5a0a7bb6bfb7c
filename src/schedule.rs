//! Assignment of loop indices to workers.
//!
//! A [`Schedule`] is turned into a [`Partition`] for one loop. Each worker then
//! asks the partition for its chunks with [`Partition::for_each_chunk`]. Every
//! index of the loop is handed out exactly once, whatever the policy.
//!
//! ```text
//! static   w0: [0 .. 25)            w1: [25 .. 50)   ...  (one block each)
//! dynamic  w?: [0..1) [1..2) [2..3) ...                    (first come, first served)
//! guided   w?: [0..25) [25..44) [44..58) ... [99..100)    (shrinking chunks)
//! ```

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::sync::{AtomicUsize, Ordering};

/// Policy for splitting a loop across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schedule {
    /// One contiguous block per worker, fixed before the loop starts.
    Static,
    /// Fixed-size chunks claimed from a shared cursor as workers free up.
    Dynamic {
        /// Indices per claim
        chunk: usize,
    },
    /// Claims of `ceil(remaining / workers)` indices, never fewer than
    /// `min_chunk`.
    Guided {
        /// Smallest claim, except for the tail of the loop
        min_chunk: usize,
    },
}

impl Schedule {
    /// Dynamic scheduling with one index per claim.
    pub const DYNAMIC: Schedule = Schedule::Dynamic { chunk: 1 };

    /// Guided scheduling down to single indices.
    pub const GUIDED: Schedule = Schedule::Guided { min_chunk: 1 };

    /// Reject chunk sizes of zero.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Schedule::Dynamic { chunk: 0 } => Err(Error::InvalidSchedule(
                "dynamic chunk must be at least 1".to_string(),
            )),
            Schedule::Guided { min_chunk: 0 } => Err(Error::InvalidSchedule(
                "guided minimum chunk must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Replace the chunk parameter, leaving `Static` untouched.
    pub fn with_chunk(self, chunk: usize) -> Schedule {
        match self {
            Schedule::Static => Schedule::Static,
            Schedule::Dynamic { .. } => Schedule::Dynamic { chunk },
            Schedule::Guided { .. } => Schedule::Guided { min_chunk: chunk },
        }
    }

    /// Prepare to hand out `range` to `workers` workers.
    pub fn partition(&self, range: Range<usize>, workers: usize) -> Partition {
        Partition {
            schedule: *self,
            start: range.start,
            len: range.end.saturating_sub(range.start),
            workers: workers.max(1),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Static
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Schedule::Static => f.write_str("static"),
            Schedule::Dynamic { chunk } => write!(f, "dynamic,{}", chunk),
            Schedule::Guided { min_chunk } => write!(f, "guided,{}", min_chunk),
        }
    }
}

impl FromStr for Schedule {
    type Err = String;

    /// Parses `static`, `dynamic`, `guided`, optionally followed by `,<chunk>`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, chunk) = match s.split_once(',') {
            Some((kind, chunk)) => {
                let chunk = chunk
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| format!("invalid chunk '{}': {}", chunk, e))?;
                (kind.trim(), Some(chunk))
            }
            None => (s.trim(), None),
        };

        let schedule = match kind.to_ascii_lowercase().as_str() {
            "static" => Schedule::Static,
            "dynamic" => Schedule::DYNAMIC,
            "guided" => Schedule::GUIDED,
            other => {
                return Err(format!(
                    "unknown schedule '{}': expected static, dynamic or guided",
                    other
                ))
            }
        };

        Ok(match chunk {
            Some(chunk) => schedule.with_chunk(chunk),
            None => schedule,
        })
    }
}

/// One loop's worth of indices being handed out under a [`Schedule`].
///
/// Shared by reference between the workers of a parallel region.
#[derive(Debug)]
pub struct Partition {
    schedule: Schedule,
    start: usize,
    len: usize,
    workers: usize,
    // Offset of the next unclaimed index, used by dynamic and guided.
    cursor: AtomicUsize,
}

impl Partition {
    /// Number of indices in the loop.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the loop has no indices.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Call `f` with each chunk assigned to `worker`, in claim order.
    ///
    /// Under `Static` the chunks depend only on `worker`. Under the other
    /// policies they depend on how fast the workers go.
    pub fn for_each_chunk(&self, worker: usize, mut f: impl FnMut(Range<usize>)) {
        match self.schedule {
            Schedule::Static => {
                let block = static_block(self.len, self.workers, worker);
                if !block.is_empty() {
                    f(self.offset(block));
                }
            }
            Schedule::Dynamic { chunk } => {
                let chunk = chunk.max(1);
                loop {
                    let begin = self.cursor.fetch_add(chunk, Ordering::Relaxed);
                    if begin >= self.len {
                        break;
                    }
                    f(self.offset(begin..(begin + chunk).min(self.len)));
                }
            }
            Schedule::Guided { min_chunk } => {
                while let Some(chunk) = self.claim_guided(min_chunk.max(1)) {
                    f(self.offset(chunk));
                }
            }
        }
    }

    fn claim_guided(&self, min_chunk: usize) -> Option<Range<usize>> {
        let mut begin = self.cursor.load(Ordering::Relaxed);
        loop {
            if begin >= self.len {
                return None;
            }
            let size = guided_chunk(self.len - begin, self.workers, min_chunk);
            match self.cursor.compare_exchange_weak(
                begin,
                begin + size,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(begin..begin + size),
                Err(actual) => begin = actual,
            }
        }
    }

    fn offset(&self, chunk: Range<usize>) -> Range<usize> {
        self.start + chunk.start..self.start + chunk.end
    }
}

/// Block of `0..len` owned by `worker` under static scheduling.
///
/// Blocks differ in length by at most one. The first `len % workers` workers
/// take the longer blocks.
///
/// # Examples
///
/// ```
/// use sync_reductions::schedule::static_block;
///
/// assert_eq!(static_block(10, 4, 0), 0..3);
/// assert_eq!(static_block(10, 4, 1), 3..6);
/// assert_eq!(static_block(10, 4, 2), 6..8);
/// assert_eq!(static_block(10, 4, 3), 8..10);
/// ```
pub fn static_block(len: usize, workers: usize, worker: usize) -> Range<usize> {
    let workers = workers.max(1);
    if worker >= workers {
        return len..len;
    }
    let base = len / workers;
    let extra = len % workers;
    let start = worker * base + worker.min(extra);
    let size = base + usize::from(worker < extra);
    start..start + size
}

/// Size of the next guided claim when `remaining` indices are left.
///
/// # Examples
///
/// ```
/// use sync_reductions::schedule::guided_chunk;
///
/// assert_eq!(guided_chunk(100, 4, 1), 25);
/// assert_eq!(guided_chunk(3, 4, 1), 1);
/// assert_eq!(guided_chunk(3, 4, 8), 3);
/// ```
pub fn guided_chunk(remaining: usize, workers: usize, min_chunk: usize) -> usize {
    let proportional = (remaining + workers.max(1) - 1) / workers.max(1);
    proportional.max(min_chunk).min(remaining)
}

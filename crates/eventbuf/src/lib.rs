//! EventBuf - Unbounded Multi-Producer FIFO Buffer
//!
//! A thread-safe, unbounded FIFO buffer connecting fire-and-forget producers
//! to a blocking drain consumer. Producers never block and never observe
//! internal failures; the consumer blocks until an item is available.
//!
//! # Key Properties
//!
//! - Non-blocking `enqueue` from any number of threads
//! - Blocking `dequeue` with FIFO delivery, each item to exactly one consumer
//! - Unbounded capacity: producers are never backpressured (the drain
//!   consumer stalling grows memory instead of stalling callers)
//! - Idempotent `close` that lets consumers drain remaining items
//!
//! # Example
//!
//! ```
//! use eventbuf::EventBuffer;
//! use std::sync::Arc;
//!
//! let buffer = Arc::new(EventBuffer::new());
//!
//! let producer = Arc::clone(&buffer);
//! std::thread::spawn(move || {
//!     producer.enqueue("hello").ok();
//! });
//!
//! // Blocks until the producer's item arrives
//! assert_eq!(buffer.dequeue(), Some("hello"));
//! ```

mod buffer;
mod metrics;

pub use buffer::{EnqueueError, EventBuffer};
pub use metrics::BufferMetrics;

//! Pipeline stages for exam digitization.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap an
//! implementation (e.g. the extraction backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ page ──────────────▶ merge
//! (pdfium)   (base64)   (cache ⇄ extract)    (join by question number)
//! ```
//!
//! 1. [`render`] — rasterise a page range; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`] — PNG-encode and base64-wrap each page for the multimodal
//!    request body
//! 3. [`client`] — the extraction seam: one instruction + one image in, raw
//!    response text out; the only stage with network I/O
//! 4. [`page`]   — the unit of work and of failure isolation: cache lookup,
//!    extraction on miss, parse, cache write
//! 5. [`merge`]  — pure join of question fragments with answer fragments

pub mod client;
pub mod encode;
pub mod merge;
pub mod page;
pub mod render;

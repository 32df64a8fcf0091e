//! Pipeline stages for text-and-screenshots to carousel conversion.
//!
//! Each stage module implements exactly one transformation step; the
//! support modules hold what several stages share.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ analyze ──▶ plan ──▶ composite ──▶ beautify ──▶ audit
//! (paths)    (VLM)      (LLM)    (image, CPU)  (VLM edit)   (VLM)
//! ```
//!
//! 1. [`analyze`]   — content blocks and screenshot metadata from one vision call
//! 2. [`plan`]      — layout plan with every placement default resolved
//! 3. [`composite`] — deterministic base slides; runs on the blocking pool
//! 4. [`beautify`]  — sequential model edits chained by style reference
//! 5. [`audit`]     — read-only quality verdict
//!
//! Support: [`input`] resolves screenshot paths and URLs, [`encode`]
//! downscales and encodes images for requests, [`inference`] is the seam to
//! the model, [`extract`] pulls strict JSON out of model prose.

pub mod analyze;
pub mod audit;
pub mod beautify;
pub mod composite;
pub mod encode;
pub mod extract;
pub mod inference;
pub mod input;
pub mod plan;

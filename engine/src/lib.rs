//! Tool-use code-repair episode engine over a sandboxed execution layer.
//!
//! An agent is handed a broken code task, a fixed menu of candidate patches,
//! and a step budget; it chooses among applying a patch, running the test
//! suite, reading the reference file, or stopping, and is scored on the test
//! pass-rate it reaches under tool-call and wall-clock penalties.
//!
//! The crate enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (result contract, pass-rate
//!   extraction, action decoding, path confinement). No I/O, fully testable
//!   in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, the sandbox
//!   backends, task loading, workspace lifecycle). Isolated to enable
//!   scripted backends in tests.
//!
//! [`episode`] coordinates core logic with I/O to implement the episode state
//! machine; [`agents`] holds baseline policies consuming it.

pub mod agents;
pub mod core;
pub mod episode;
pub mod io;
pub mod logging;

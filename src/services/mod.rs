//! Engine services: pure logic with no I/O except the orchestrator's
//! provider calls.

pub mod block_diff;
pub mod clause_matcher;
pub mod fingerprint;
pub mod markup;
pub mod orchestrator;
pub mod package_bundle;
pub mod structural_patcher;

pub use block_diff::{apply_rewrite, diff_blocks, BlockDiffOutcome, DiffChunk};
pub use clause_matcher::{ClauseMatcher, MatchOutcome, MatchVia};
pub use fingerprint::draft_key;
pub use markup::StructuredDoc;
pub use orchestrator::{Orchestrator, RewriteOutcome, HEURISTIC_PROVIDER};
pub use structural_patcher::{PatchOutcome, StructuralPatcher};

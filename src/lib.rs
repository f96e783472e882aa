// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Resource management core for a real-time 3D renderer.
//!
//! Kiln owns the CPU-side bookkeeping a frame-pipelined renderer needs to
//! stay ahead of the device: descriptor allocation with deferred
//! reclamation, staging-memory sub-allocation, and resource state tracking
//! with transition barrier resolution.
//!
//! # Key entry points
//!
//! - [`system::GraphicsSystem`] - per-device allocators, frame clock, and
//!   state registry
//! - [`descriptor::allocator::DescriptorAllocator`] - pooled descriptor
//!   block allocation with frame-deferred reclamation
//! - [`tracking::tracker::ResourceStateTracker`] - per-context barrier
//!   recording and resolution
//! - [`options::CoreOptions`] - runtime configuration (pool sizing)
//!
//! # Architecture
//!
//! Everything keys off a monotonic frame clock. Descriptor frees are
//! tagged with the frame in flight and reclaimed once the retire fence
//! reports that frame complete on the device. Resource states live in a
//! process-wide registry; command contexts record transitions locally,
//! defer the ones whose prior state they cannot know, and resolve those
//! against the registry at submission under a single lock held across
//! resolve and commit.

pub mod descriptor;
pub mod device;
pub mod error;
pub mod frame;
pub mod options;
pub mod system;
pub mod tracking;
pub mod upload;

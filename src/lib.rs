//! # juliatsa
//!
//! Rigorous interval-arithmetic computation of filled Julia sets for
//! quadratic-through-sextic complex polynomials z ← f(z) with
//! f ∈ {z²+c, z²+Az+c, z³+Az+c, z⁴+Az+c, z⁵+Az+c, z⁶+Az+c}.
//!
//! Every pixel in the output grid is classified WHITE (provably
//! escapes), BLACK (provably stays bounded), or GRAY (undecided at the
//! current resolution) — never by iterating a floating-point orbit and
//! guessing, but by propagating interval bounding boxes through a
//! reverse cell graph until no further cell can change. A residual-gray
//! region that survives to the fixed point, with no path back out to
//! WHITE, is reclassified BLACK: its escape would require a counterpart
//! cell turning white first, and none exists.
//!
//! ## Module map
//!
//! - [`fixed_point`] — the reference 128-bit sign-magnitude number type.
//! - [`interval`] / [`polynomial`] — interval arithmetic and per-degree
//!   bounding-box functions.
//! - [`grid`] — the bit-packed pixel grid.
//! - [`geometry`] — the affine map between cell indices and plane
//!   coordinates.
//! - [`reverse_graph`] — the coarse-tile reverse graph and its
//!   `tovisit` worklist.
//! - [`propagation`] — the two-phase monotone propagation engine.
//! - [`periodicity`] — Fatou-component / cycle analysis.
//! - [`raw_codec`] / [`bitmap`] — on-disk grid and image formats.
//! - [`arena`] — capacity-bounded bump allocators.
//! - [`cli`] — token-grammar configuration parsing.
//! - [`engine`] — the per-run object that owns everything above.
//! - [`error`] / [`logging`] — ambient error and logging infrastructure.

pub mod arena;
pub mod bitmap;
pub mod cli;
pub mod engine;
pub mod error;
pub mod fixed_point;
pub mod geometry;
pub mod grid;
pub mod interval;
pub mod logging;
pub mod periodicity;
pub mod polynomial;
pub mod propagation;
pub mod raw_codec;
pub mod reverse_graph;

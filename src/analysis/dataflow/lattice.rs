//! Lattice abstraction for dataflow facts.

/// A meet semi-lattice: the value domain of a dataflow analysis.
///
/// The meet operation combines facts arriving at a control-flow merge point.
/// For a *may* analysis (live variables) meet is union; for a *must* analysis
/// (available expressions) meet is intersection.
pub trait MeetSemiLattice: Clone + PartialEq {
    /// Combines two facts at a merge point.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;

    /// Returns `true` if this fact can no longer decrease.
    fn is_bottom(&self) -> bool;
}

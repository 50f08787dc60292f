/// Reasons a corner-based pose could not be produced.
///
/// None of these are fatal for a caller that tracks anchors: each one is
/// recovered by a lower-fidelity placement.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseError {
    #[error("not enough corner points for a pose (need >=4, got {got})")]
    InsufficientCorners { got: usize },
    #[error("homography system has no usable solution")]
    SingularSystem,
    #[error("homography is degenerate, no pose can be decomposed")]
    DegeneratePose,
}

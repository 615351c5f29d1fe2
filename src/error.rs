use thiserror::Error;

/// The generic Error type, which provides coverage for all errors this library
/// can potentially return.
///
/// Most failures inside an optimization pass never surface as this type: the
/// [`apply`](crate::passes::OptimizationPass::apply) boundary converts them
/// into a failed [`OptimizationResult`](crate::passes::OptimizationResult)
/// so a single misbehaving pass cannot abort a multi-pass pipeline. The
/// variants here cover the remaining cases: wiring-time configuration errors
/// and the evaluation failures passes propagate internally before the `apply`
/// boundary contains them.
///
/// # Examples
///
/// ```rust
/// use optforge::{Error, pipeline::OptimizerRegistry, passes::OptimizationKind};
///
/// let registry = OptimizerRegistry::new();
/// match registry.build(OptimizationKind::ConstantFolding) {
///     Ok(_) => println!("pass constructed"),
///     Err(Error::UnknownKind(kind)) => eprintln!("not registered: {kind}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The requested optimization kind is not registered with the factory.
    ///
    /// This is the single deliberately fatal condition in the crate: it is a
    /// caller-configuration error resolved at pipeline wiring time, not a
    /// runtime data condition, and callers are expected to propagate it
    /// immediately rather than recover.
    #[error("Requested optimization kind is not registered - {0}")]
    UnknownKind(String),

    /// A constant evaluation hit an unsupported operand shape or a domain
    /// error (division by a literal zero, arithmetic overflow).
    ///
    /// Passes catch this locally and return the offending instruction
    /// unmodified; it never crosses the `apply` boundary.
    #[error("Evaluation failed - {0}")]
    Evaluation(String),

    /// Unexpected failure inside a pass's `optimize` step.
    ///
    /// Carried across the pass internals and converted into a failed result
    /// (with this error's text) at the `apply` boundary.
    #[error("Pass '{pass}' failed - {message}")]
    PassFailed {
        /// Name of the failing pass.
        pass: &'static str,
        /// Description of the failure.
        message: String,
    },
}

/// A specialized `Result` type for optimization operations.
pub type Result<T> = std::result::Result<T, Error>;

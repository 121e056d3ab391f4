use std::error::Error;

/// Error value flowing through the `on_error` channel.
///
/// Protocol violations, user-code failures and composed cleanup failures all
/// surface as one of these variants, so operators can inject protocol errors
/// into the same channel user errors travel on.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
  /// A downstream requested zero demand.
  #[error("n > 0 required")]
  BadDemand,

  /// An operator was constructed with an out-of-domain argument.
  #[error("{context}")]
  InvalidArgument {
    /// What was wrong with the argument.
    context: String,
  },

  /// An error raised by user code: a source, supplier, factory or cleanup.
  #[error("{0}")]
  User(#[source] Box<dyn Error + Send + Sync>),

  /// A primary error carrying suppressed secondary ones, the shape a cleanup
  /// failure takes when it displaces the terminal that was underway. The
  /// display shows the primary alone; `suppressed()` reaches the rest.
  #[error("{primary}")]
  Composite {
    primary: Box<FlowError>,
    suppressed: Vec<FlowError>,
  },
}

impl FlowError {
  pub fn invalid_argument(context: impl Into<String>) -> Self {
    FlowError::InvalidArgument {
      context: context.into(),
    }
  }

  pub fn user(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
    FlowError::User(err.into())
  }

  /// Attaches `suppressed` to `self`, folding into an existing composite
  /// instead of nesting.
  pub fn with_suppressed(self, suppressed: FlowError) -> Self {
    match self {
      FlowError::Composite {
        primary,
        suppressed: mut list,
      } => {
        list.push(suppressed);
        FlowError::Composite {
          primary,
          suppressed: list,
        }
      }
      primary => FlowError::Composite {
        primary: Box::new(primary),
        suppressed: vec![suppressed],
      },
    }
  }

  /// The primary error: `self` unless this is a composite.
  pub fn primary(&self) -> &FlowError {
    match self {
      FlowError::Composite { primary, .. } => primary,
      other => other,
    }
  }

  /// Errors suppressed behind the primary one, empty for plain errors.
  pub fn suppressed(&self) -> &[FlowError] {
    match self {
      FlowError::Composite { suppressed, .. } => suppressed,
      _ => &[],
    }
  }
}

/// Sink for errors that can no longer be signalled: the downstream is gone,
/// so the best we can do is leave a trace.
pub(crate) fn on_error_dropped(err: FlowError) {
  log::error!("dropped error with no downstream left to signal it: {err}");
}

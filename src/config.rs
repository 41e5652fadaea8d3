//! Container configuration

/// Represents a container configuration
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiConfig {
    /// Specifies whether bindings may replace existing ones without being flagged as overrides
    ///
    /// Default: `false`
    allow_silent_override: bool,

    /// Specifies whether error messages use fully qualified type names
    ///
    /// Default: `false`
    full_description_on_error: bool,

    /// Specifies whether not-found errors list every binding of the container
    ///
    /// Default: `false`
    full_container_tree_on_error: bool,
}

impl DiConfig {
    /// Creates a default configuration
    ///
    /// Defaults:
    /// - allow_silent_override: `false`
    /// - full_description_on_error: `false`
    /// - full_container_tree_on_error: `false`
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows re-binding a key without flagging the binding as an override
    ///
    /// Default: `false`
    #[inline]
    pub fn with_silent_override(mut self) -> Self {
        self.allow_silent_override = true;
        self
    }

    /// Uses fully qualified type names in error messages
    ///
    /// Default: `false`
    #[inline]
    pub fn with_full_description_on_error(mut self) -> Self {
        self.full_description_on_error = true;
        self
    }

    /// Appends the whole binding table to not-found errors
    ///
    /// Default: `false`
    #[inline]
    pub fn with_full_container_tree_on_error(mut self) -> Self {
        self.full_container_tree_on_error = true;
        self
    }

    #[inline]
    pub fn allow_silent_override(&self) -> bool {
        self.allow_silent_override
    }

    #[inline]
    pub fn full_description_on_error(&self) -> bool {
        self.full_description_on_error
    }

    #[inline]
    pub fn full_container_tree_on_error(&self) -> bool {
        self.full_container_tree_on_error
    }
}

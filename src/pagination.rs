//! This modules defines the common functionality for paging data.

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The number of items to return when the request does not specify a limit.
    pub default_limit: u32,
    /// The number of items to skip when the request does not specify an offset.
    pub default_skip: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            default_skip: 0,
        }
    }
}

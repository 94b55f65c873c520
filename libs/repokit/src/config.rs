use query_core::{CompileLimits, PageRequest};
use serde::{Deserialize, Serialize};

/// Repository tuning, usually read from the `repository` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Page size used when the caller does not send one.
    pub default_page_size: u32,
    /// Requested page sizes above this are lowered to it.
    pub max_page_size: u32,
    pub limits: CompileLimits,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_page_size: PageRequest::DEFAULT_SIZE,
            max_page_size: 1000,
            limits: CompileLimits::default(),
        }
    }
}

impl RepositoryConfig {
    /// Build a page request, filling in the default size and applying the cap.
    pub fn page(&self, index: u32, size: Option<u32>) -> query_core::Result<PageRequest> {
        let request = PageRequest::new(index, size.unwrap_or(self.default_page_size))?;
        Ok(request.clamp_size(self.max_page_size))
    }
}

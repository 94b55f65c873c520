use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Zero-based page index plus a strictly positive page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPageRequest")]
pub struct PageRequest {
    index: u32,
    size: u32,
}

#[derive(Deserialize)]
struct RawPageRequest {
    #[serde(default)]
    index: u32,
    #[serde(default = "default_size")]
    size: u32,
}

fn default_size() -> u32 {
    PageRequest::DEFAULT_SIZE
}

impl TryFrom<RawPageRequest> for PageRequest {
    type Error = Error;

    fn try_from(raw: RawPageRequest) -> Result<Self> {
        PageRequest::new(raw.index, raw.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            index: 0,
            size: Self::DEFAULT_SIZE,
        }
    }
}

impl PageRequest {
    pub const DEFAULT_SIZE: u32 = 10;

    pub fn new(index: u32, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidPage("page size must be positive".into()));
        }
        Ok(Self { index, size })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.index) * u64::from(self.size)
    }

    /// Same index with the size lowered to `max` if it exceeds it.
    pub fn clamp_size(self, max: u32) -> Self {
        Self {
            index: self.index,
            size: self.size.min(max.max(1)),
        }
    }
}

/// One window of results plus the metadata needed to navigate.
///
/// `total_pages` and the `has_*` flags are always derived from `total_count`
/// and `size`, never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    index: u32,
    size: u32,
    total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        debug_assert!(items.len() <= request.size as usize);
        Self {
            items,
            index: request.index,
            size: request.size,
            total_count,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u64 {
        self.total_count.div_ceil(u64::from(self.size))
    }

    pub fn has_previous_page(&self) -> bool {
        self.index > 0
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.index) + 1 < self.total_pages()
    }

    /// Map items while preserving page metadata (entity -> DTO mapping convenience).
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            index: self.index,
            size: self.size,
            total_count: self.total_count,
        }
    }
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Page", 7)?;
        s.serialize_field("items", &self.items)?;
        s.serialize_field("index", &self.index)?;
        s.serialize_field("size", &self.size)?;
        s.serialize_field("totalCount", &self.total_count)?;
        s.serialize_field("totalPages", &self.total_pages())?;
        s.serialize_field("hasPreviousPage", &self.has_previous_page())?;
        s.serialize_field("hasNextPage", &self.has_next_page())?;
        s.end()
    }
}

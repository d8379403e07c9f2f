use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Zero-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Builds a request from optional query parameters.
    pub fn from_parts(page: Option<u32>, size: Option<u32>, default_size: u32) -> Self {
        Self::new(page.unwrap_or(0), size.unwrap_or(default_size))
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            page: request.page,
            size: request.size,
            total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            page: self.page,
            size: self.size,
            total: self.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(PageRequest::new(0, 0).size, 1);
        assert_eq!(PageRequest::new(0, 10_000).size, MAX_PAGE_SIZE);
    }

    #[test]
    fn offset_scales_with_page() {
        let request = PageRequest::from_parts(Some(3), None, 20);
        assert_eq!(request.limit(), 20);
        assert_eq!(request.offset(), 60);
    }
}

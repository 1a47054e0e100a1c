use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// A validated, non-blank title search term, kept in lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm(String);

impl SearchTerm {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let term = raw.trim();
        if term.is_empty() {
            return Err(ServiceError::Validation(
                "search term must not be empty".to_string(),
            ));
        }
        Ok(Self(term.to_lowercase()))
    }

    /// Case-insensitive substring test. Folding is Unicode-aware, and `%`/`_`
    /// are ordinary characters.
    pub fn matches(&self, title: &str) -> bool {
        title.to_lowercase().contains(&self.0)
    }
}

/// Zero-based page index plus page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Result<Self, ServiceError> {
        if page < 0 {
            return Err(ServiceError::Validation(format!(
                "page index must not be negative (got {page})"
            )));
        }
        if size <= 0 {
            return Err(ServiceError::Validation(format!(
                "page size must be positive (got {size})"
            )));
        }
        let page = u32::try_from(page)
            .map_err(|_| ServiceError::Validation(format!("page index too large (got {page})")))?;
        let size = u32::try_from(size)
            .map_err(|_| ServiceError::Validation(format!("page size too large (got {size})")))?;
        if i64::from(page).checked_mul(i64::from(size)).is_none() {
            return Err(ServiceError::Validation(
                "page offset out of range".to_string(),
            ));
        }
        Ok(Self { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }
}

/// One page of results with enough metadata to navigate the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let size = u64::from(request.size);
        Self {
            items,
            page: request.page,
            size: request.size,
            total_items,
            total_pages: total_items.div_ceil(size),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}
